//! Mutation kinds and the per-intent state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Add,
    Update,
    Delete,
    ToggleComplete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutationKind::Add => "add",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
            MutationKind::ToggleComplete => "toggle_complete",
        };
        f.write_str(s)
    }
}

/// Phase of a single mutation intent.
///
/// State transitions:
/// - Idle -> Applying -> AwaitingRemote -> Committed
/// - Idle -> Applying -> AwaitingRemote -> RolledBack
/// - Applying -> RolledBack (reconciliation task never started)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPhase {
    Idle,

    /// Optimistic change is being written to the store.
    Applying,

    /// Remote call issued, store holds the optimistic value.
    AwaitingRemote,

    /// Server result merged into the store.
    Committed,

    /// Store restored to the pre-intent snapshot.
    RolledBack,
}

impl MutationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, MutationPhase::Committed | MutationPhase::RolledBack)
    }

    pub fn can_transition_to(self, next: MutationPhase) -> bool {
        use MutationPhase::*;
        matches!(
            (self, next),
            (Idle, Applying)
                | (Applying, AwaitingRemote)
                | (Applying, RolledBack)
                | (AwaitingRemote, Committed)
                | (AwaitingRemote, RolledBack)
        )
    }
}
