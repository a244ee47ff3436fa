//! Observability - 集計ビュー

use serde::{Deserialize, Serialize};

use crate::domain::Task;

/// Dashboard tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl StoreCounts {
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut counts = StoreCounts::default();
        for task in tasks {
            counts.total += 1;
            if task.completed {
                counts.completed += 1;
            } else {
                counts.pending += 1;
            }
        }
        counts
    }
}
