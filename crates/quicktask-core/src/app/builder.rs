//! ReconcilerBuilder - MutationReconciler の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - seed に同じ canonical ID が二度現れたら build() が BuildError を返す
//! - 未指定の依存はデフォルト（UlidGenerator + SystemClock）で埋める

use std::collections::HashSet;

use crate::domain::{CanonicalId, CanonicalTask};
use crate::ports::{LocalIdGenerator, SystemClock, TaskRemote, UlidGenerator};

use super::MutationReconciler;

/// # 使用例
/// ```ignore
/// let reconciler = ReconcilerBuilder::new(remote)
///     .id_generator(UlidGenerator::new(FixedClock::new(at)))
///     .seed(initial_tasks)
///     .build()?;
/// ```
pub struct ReconcilerBuilder<R> {
    remote: R,
    ids: Option<Box<dyn LocalIdGenerator>>,
    seed: Vec<CanonicalTask>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("duplicate task id in seed: {0}")]
    DuplicateSeed(CanonicalId),
}

impl<R: TaskRemote + 'static> ReconcilerBuilder<R> {
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            ids: None,
            seed: Vec::new(),
        }
    }

    pub fn id_generator(mut self, ids: impl LocalIdGenerator + 'static) -> Self {
        self.ids = Some(Box::new(ids));
        self
    }

    /// Tasks already known to be on the server (e.g. from a prior list fetch).
    pub fn seed(mut self, tasks: impl IntoIterator<Item = CanonicalTask>) -> Self {
        self.seed.extend(tasks);
        self
    }

    pub fn build(self) -> Result<MutationReconciler<R>, BuildError> {
        let mut seen = HashSet::new();
        for task in &self.seed {
            if !seen.insert(&task.id) {
                return Err(BuildError::DuplicateSeed(task.id.clone()));
            }
        }
        let ids = self
            .ids
            .unwrap_or_else(|| Box::new(UlidGenerator::new(SystemClock)));
        Ok(MutationReconciler::from_parts(self.remote, ids, self.seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use crate::impls::InMemoryRemote;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn server_task(id: &str, title: &str) -> CanonicalTask {
        CanonicalTask {
            id: CanonicalId::new(id),
            title: title.to_string(),
            description: None,
            completed: false,
            created_at: None,
        }
    }

    #[test]
    fn build_with_seed_populates_store() {
        let reconciler = ReconcilerBuilder::new(InMemoryRemote::new())
            .seed(vec![server_task("srv-1", "a"), server_task("srv-2", "b")])
            .build()
            .unwrap();

        let snapshot = reconciler.snapshot();
        assert_eq!(
            snapshot.ids(),
            vec![
                TaskId::Canonical(CanonicalId::new("srv-1")),
                TaskId::Canonical(CanonicalId::new("srv-2")),
            ]
        );
    }

    #[test]
    fn build_rejects_duplicate_seed_ids() {
        let result = ReconcilerBuilder::new(InMemoryRemote::new())
            .seed(vec![server_task("srv-1", "a"), server_task("srv-1", "b")])
            .build();

        assert!(matches!(
            result,
            Err(BuildError::DuplicateSeed(id)) if id == CanonicalId::new("srv-1")
        ));
    }

    #[tokio::test]
    async fn custom_id_generator_is_used_for_local_ids() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let remote = std::sync::Arc::new(InMemoryRemote::new());
        let reconciler = ReconcilerBuilder::new(std::sync::Arc::clone(&remote))
            .id_generator(UlidGenerator::new(FixedClock::new(at)))
            .build()
            .unwrap();

        remote.pause();
        let add = tokio::spawn({
            let reconciler = reconciler.clone();
            async move { reconciler.add(crate::domain::NewTask::new("x")).await }
        });
        remote.wait_for_calls(1).await;

        let snapshot = reconciler.snapshot();
        match &snapshot[0].id {
            TaskId::Local(local) => {
                assert_eq!(local.as_ulid().timestamp_ms(), at.timestamp_millis() as u64)
            }
            other => panic!("expected a local id, got {other}"),
        }

        remote.resume();
        add.await.unwrap().unwrap();
    }
}
