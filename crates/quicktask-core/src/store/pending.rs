//! Undo record for one optimistic mutation.

use crate::domain::{LocalId, MutationKind, MutationPhase, Task, TaskId, TaskPatch};

use super::TaskStore;

/// Everything needed to apply an intent to the store and to undo it exactly.
///
/// Design:
/// - `optimistic` is the value written at apply time (`None` for a delete).
/// - `snapshot_before` is the value restored on rollback (`None` for an add).
/// - Rollback is set-to-snapshot, never a delta, so it is idempotent.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    kind: MutationKind,
    target_id: TaskId,
    snapshot_before: Option<Task>,
    payload: Option<TaskPatch>,
    optimistic: Option<Task>,

    /// Index the target held before the intent (for re-inserting a deleted task).
    position: Option<usize>,

    phase: MutationPhase,
}

impl PendingMutation {
    pub fn add(provisional: Task) -> Self {
        Self {
            kind: MutationKind::Add,
            target_id: provisional.id.clone(),
            snapshot_before: None,
            payload: None,
            optimistic: Some(provisional),
            position: None,
            phase: MutationPhase::Idle,
        }
    }

    /// Update or ToggleComplete: `before.apply(&patch)` becomes the optimistic value.
    pub fn patch(kind: MutationKind, before: Task, position: usize, patch: TaskPatch) -> Self {
        Self {
            kind,
            target_id: before.id.clone(),
            optimistic: Some(before.apply(&patch)),
            snapshot_before: Some(before),
            payload: Some(patch),
            position: Some(position),
            phase: MutationPhase::Idle,
        }
    }

    pub fn delete(before: Task, position: usize) -> Self {
        Self {
            kind: MutationKind::Delete,
            target_id: before.id.clone(),
            snapshot_before: Some(before),
            payload: None,
            optimistic: None,
            position: Some(position),
            phase: MutationPhase::Idle,
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn target_id(&self) -> &TaskId {
        &self.target_id
    }

    /// The local id minted for an add, if this is one.
    pub fn local_id(&self) -> Option<LocalId> {
        match (&self.kind, &self.target_id) {
            (MutationKind::Add, TaskId::Local(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn snapshot_before(&self) -> Option<&Task> {
        self.snapshot_before.as_ref()
    }

    pub fn payload(&self) -> Option<&TaskPatch> {
        self.payload.as_ref()
    }

    pub fn phase(&self) -> MutationPhase {
        self.phase
    }

    pub fn advance(&mut self, next: MutationPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid mutation phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        self.phase = next;
    }

    /// Write the optimistic value.
    pub fn apply(&self, store: &mut TaskStore) {
        match &self.optimistic {
            Some(task) => store.upsert(task.clone()),
            None => {
                store.remove_by_id(&self.target_id);
            }
        }
    }

    /// Put the store back to its pre-intent state for this target.
    pub fn restore(&self, store: &mut TaskStore) {
        match &self.snapshot_before {
            Some(before) => store.restore(before.clone(), self.position.unwrap_or(usize::MAX)),
            None => {
                store.remove_by_id(&self.target_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CanonicalId, NewTask};
    use ulid::Ulid;

    fn seeded() -> TaskStore {
        let mut store = TaskStore::new();
        for (id, title) in [("srv-1", "a"), ("srv-2", "b"), ("srv-3", "c")] {
            store.upsert(Task {
                id: TaskId::Canonical(CanonicalId::new(id)),
                title: title.to_string(),
                description: None,
                completed: false,
                created_at: None,
            });
        }
        store
    }

    fn target(store: &TaskStore, id: &str) -> (Task, usize) {
        let id = TaskId::Canonical(CanonicalId::new(id));
        let position = store.position(&id).unwrap();
        (store.get(&id).unwrap().clone(), position)
    }

    #[test]
    fn rollback_twice_equals_rollback_once() {
        let mut store = seeded();
        let before = store.snapshot();
        let (task, position) = target(&store, "srv-2");

        let pending = PendingMutation::patch(
            MutationKind::ToggleComplete,
            task,
            position,
            TaskPatch::default().completed(true),
        );
        pending.apply(&mut store);
        assert_ne!(store.snapshot(), before);

        pending.restore(&mut store);
        let once = store.snapshot();
        pending.restore(&mut store);

        assert_eq!(store.snapshot(), once);
        assert_eq!(once, before);
    }

    #[test]
    fn deleted_task_comes_back_in_place() {
        let mut store = seeded();
        let before = store.snapshot();
        let (task, position) = target(&store, "srv-2");

        let pending = PendingMutation::delete(task, position);
        pending.apply(&mut store);
        assert_eq!(store.len(), 2);

        pending.restore(&mut store);
        pending.restore(&mut store);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn add_rollback_removes_local_entry() {
        let mut store = seeded();
        let before = store.snapshot();
        let local = LocalId::from_ulid(Ulid::new());

        let pending = PendingMutation::add(Task::provisional(local, &NewTask::new("x")));
        pending.apply(&mut store);
        assert_eq!(store.len(), 4);
        assert_eq!(pending.local_id(), Some(local));
        assert!(pending.snapshot_before().is_none());

        pending.restore(&mut store);
        pending.restore(&mut store);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn patch_records_payload_and_snapshot() {
        let store = seeded();
        let (task, position) = target(&store, "srv-1");
        let patch = TaskPatch::default().title("renamed");

        let pending = PendingMutation::patch(MutationKind::Update, task.clone(), position, patch.clone());

        assert_eq!(pending.kind(), MutationKind::Update);
        assert_eq!(pending.snapshot_before(), Some(&task));
        assert_eq!(pending.payload(), Some(&patch));
        assert_eq!(pending.local_id(), None);
        assert_eq!(pending.phase(), MutationPhase::Idle);
    }

    #[test]
    fn advance_follows_the_state_machine() {
        let store = seeded();
        let (task, position) = target(&store, "srv-1");
        let mut pending = PendingMutation::delete(task, position);

        pending.advance(MutationPhase::Applying);
        pending.advance(MutationPhase::AwaitingRemote);
        pending.advance(MutationPhase::Committed);

        assert!(pending.phase().is_terminal());
    }
}
