//! MutationReconciler - 楽観的更新と正本との突き合わせ
//!
//! # 三段階プロトコル
//! 1. **Optimistic apply**: 同期的に TaskStore を書き換え、元に戻すための PendingMutation を記録
//! 2. **Remote dispatch**: リモート呼び出し（唯一の await ポイント）
//! 3. **Reconciliation**: 成功ならサーバーの結果で確定（remap / upsert）、失敗ならスナップショットへ戻す
//!
//! # 設計原則
//! - 同じ ID への重複した intent は合流させず、拒否する（PendingCreateConflict / InFlightConflict）
//! - ロック中に await しない
//! - 2 と 3 は spawn したタスクで実行するので、呼び出し側の future が drop されても完了する
//! - PendingMutation は確定かロールバックのどちらか一度だけ消費される

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::{
    CanonicalId, CanonicalTask, LocalId, MutationKind, MutationPhase, NewTask, RemoteError,
    SurfacedError, SyncError, Task, TaskId, TaskPatch,
};
use crate::observability::StoreCounts;
use crate::ports::{LocalIdGenerator, SystemClock, TaskRemote, UlidGenerator};
use crate::store::{PendingMutation, TaskSnapshot, TaskStore};

/// Store plus the bookkeeping needed to detect overlapping intents.
struct SyncState {
    store: TaskStore,

    /// Targets with a mutation between apply and reconciliation.
    in_flight: HashMap<TaskId, MutationKind>,

    /// Local ids whose create has been reconciled. An entry lives as long as
    /// its canonical task is in the store.
    aliases: HashMap<LocalId, CanonicalId>,

    /// Bumped whenever a mutation touches the store.
    generation: u64,

    last_error: Option<SurfacedError>,
}

impl SyncState {
    /// Translate a local id that has already been replaced.
    fn resolve(&self, id: &TaskId) -> TaskId {
        match id {
            TaskId::Local(local) => self
                .aliases
                .get(local)
                .map(|canonical| TaskId::Canonical(canonical.clone()))
                .unwrap_or_else(|| id.clone()),
            TaskId::Canonical(_) => id.clone(),
        }
    }

    /// Drop aliases whose canonical task has left the store.
    fn prune_aliases(&mut self) {
        let store = &self.store;
        self.aliases
            .retain(|_, canonical| store.contains(&TaskId::Canonical(canonical.clone())));
    }

    fn knows_local(&self, id: LocalId) -> bool {
        self.aliases.contains_key(&id) || self.store.contains(&TaskId::Local(id))
    }

    /// Look up the target of an update/toggle/delete, rejecting overlaps.
    fn claim_target(&self, id: &TaskId) -> Result<(Task, usize, CanonicalId), SyncError> {
        let id = self.resolve(id);

        if let Some(kind) = self.in_flight.get(&id) {
            return Err(match (&id, kind) {
                (TaskId::Local(local), MutationKind::Add) => SyncError::PendingCreateConflict(*local),
                _ => SyncError::InFlightConflict {
                    id: id.clone(),
                    kind: *kind,
                },
            });
        }

        let position = self
            .store
            .position(&id)
            .ok_or_else(|| SyncError::NotFound(id.clone()))?;
        let canonical = match &id {
            TaskId::Canonical(canonical) => canonical.clone(),
            TaskId::Local(local) => return Err(SyncError::PendingCreateConflict(*local)),
        };
        let task = self
            .store
            .get(&id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.clone()))?;
        Ok((task, position, canonical))
    }

    /// Phase 1: write the optimistic value and mark the target in flight.
    fn begin(&mut self, pending: &mut PendingMutation) {
        pending.advance(MutationPhase::Applying);
        pending.apply(&mut self.store);
        self.generation += 1;
        self.in_flight
            .insert(pending.target_id().clone(), pending.kind());
        debug!(task_id = %pending.target_id(), kind = %pending.kind(), "optimistic apply");
    }

    /// Phase 3.
    fn settle(
        &mut self,
        mut pending: PendingMutation,
        result: Result<RemoteReply, RemoteError>,
    ) -> Result<Task, SyncError> {
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => return Err(self.roll_back(pending, err.into())),
        };

        let committed = match (pending.kind(), reply) {
            (MutationKind::Add, RemoteReply::Task(server)) => self.commit_create(&pending, server),
            (MutationKind::Update | MutationKind::ToggleComplete, RemoteReply::Task(server)) => {
                self.commit_update(&pending, server)
            }
            (MutationKind::Delete, RemoteReply::Deleted) => pending
                .snapshot_before()
                .cloned()
                .ok_or_else(|| SyncError::NotFound(pending.target_id().clone())),
            (kind, _) => Err(SyncError::Remote(RemoteError::InvalidResponse(format!(
                "unexpected reply to {kind}"
            )))),
        };

        match committed {
            Ok(task) => {
                self.in_flight.remove(pending.target_id());
                self.generation += 1;
                if pending.kind() == MutationKind::Delete {
                    self.prune_aliases();
                }
                pending.advance(MutationPhase::Committed);
                info!(task_id = %task.id, kind = %pending.kind(), "mutation committed");
                Ok(task)
            }
            Err(err) => Err(self.roll_back(pending, err)),
        }
    }

    fn commit_create(
        &mut self,
        pending: &PendingMutation,
        server: CanonicalTask,
    ) -> Result<Task, SyncError> {
        let local = pending.target_id();
        if let Err(err) = self
            .store
            .remap_id(local, TaskId::Canonical(server.id.clone()))
        {
            error!(task_id = %local, canonical_id = %server.id, error = %err, "remap of created task failed");
            return Err(err.into());
        }
        if let Some(local_id) = pending.local_id() {
            self.aliases.insert(local_id, server.id.clone());
        }
        let task = Task::from(server);
        self.store.upsert(task.clone());
        Ok(task)
    }

    fn commit_update(
        &mut self,
        pending: &PendingMutation,
        server: CanonicalTask,
    ) -> Result<Task, SyncError> {
        if pending.target_id().as_canonical() != Some(&server.id) {
            return Err(SyncError::Remote(RemoteError::InvalidResponse(format!(
                "asked to update {} but server returned {}",
                pending.target_id(),
                server.id
            ))));
        }
        let task = Task::from(server);
        self.store.upsert(task.clone());
        Ok(task)
    }

    fn roll_back(&mut self, mut pending: PendingMutation, err: SyncError) -> SyncError {
        pending.restore(&mut self.store);
        self.in_flight.remove(pending.target_id());
        self.generation += 1;
        pending.advance(MutationPhase::RolledBack);
        warn!(task_id = %pending.target_id(), kind = %pending.kind(), error = %err, "mutation rolled back");
        self.surface(err)
    }

    fn surface(&mut self, err: SyncError) -> SyncError {
        self.last_error = Some(SurfacedError::from(&err));
        err
    }
}

struct Shared<R> {
    state: Mutex<SyncState>,
    remote: R,
    ids: Box<dyn LocalIdGenerator>,
}

impl<R> Shared<R> {
    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum RemoteCall {
    Create(NewTask),
    Update(CanonicalId, TaskPatch),
    Delete(CanonicalId),
}

enum RemoteReply {
    Task(CanonicalTask),
    Deleted,
}

impl RemoteCall {
    async fn send<R: TaskRemote>(self, remote: &R) -> Result<RemoteReply, RemoteError> {
        match self {
            RemoteCall::Create(draft) => remote.create_task(&draft).await.map(RemoteReply::Task),
            RemoteCall::Update(id, patch) => {
                remote.update_task(&id, &patch).await.map(RemoteReply::Task)
            }
            RemoteCall::Delete(id) => remote.delete_task(&id).await.map(|()| RemoteReply::Deleted),
        }
    }
}

/// Owns a pending mutation from dispatch until it is settled.
///
/// If dropped unsettled (the task was aborted or the remote call panicked) the
/// mutation is rolled back, so an optimistic entry is never left behind.
struct Reconciliation<R> {
    shared: Arc<Shared<R>>,
    pending: Option<PendingMutation>,
}

impl<R> Reconciliation<R> {
    fn finish(mut self, result: Result<RemoteReply, RemoteError>) -> Result<Task, SyncError> {
        match self.pending.take() {
            Some(pending) => self.shared.lock().settle(pending, result),
            None => Err(SyncError::Aborted("mutation already settled".to_string())),
        }
    }
}

impl<R> Drop for Reconciliation<R> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            let err = SyncError::Aborted("reconciliation stopped before the remote call finished".to_string());
            self.shared.lock().roll_back(pending, err);
        }
    }
}

/// Applies user intents optimistically and reconciles them with the server.
///
/// Cheap to clone; clones share the same store.
pub struct MutationReconciler<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for MutationReconciler<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: TaskRemote + 'static> MutationReconciler<R> {
    /// Empty store, ULID local ids.
    pub fn new(remote: R) -> Self {
        Self::from_parts(remote, Box::new(UlidGenerator::new(SystemClock)), Vec::new())
    }

    pub(crate) fn from_parts(
        remote: R,
        ids: Box<dyn LocalIdGenerator>,
        seed: Vec<CanonicalTask>,
    ) -> Self {
        let mut store = TaskStore::new();
        store.replace_all(seed.into_iter().map(Task::from));
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SyncState {
                    store,
                    in_flight: HashMap::new(),
                    aliases: HashMap::new(),
                    generation: 0,
                    last_error: None,
                }),
                remote,
                ids,
            }),
        }
    }

    /// Add a task. Resolves with the canonical task once the server confirms.
    pub async fn add(&self, draft: NewTask) -> Result<Task, SyncError> {
        let pending = {
            let mut state = self.shared.lock();
            if let Err(err) = draft.validate() {
                return Err(state.surface(err));
            }
            let local = self.mint_local_id(&state);
            let mut pending = PendingMutation::add(Task::provisional(local, &draft));
            state.begin(&mut pending);
            pending
        };
        self.dispatch(pending, RemoteCall::Create(draft)).await
    }

    /// Apply a partial update. The server's representation wins on success.
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, SyncError> {
        let (pending, canonical) = {
            let mut state = self.shared.lock();
            if let Err(err) = patch.validate() {
                return Err(state.surface(err));
            }
            let (before, position, canonical) = match state.claim_target(id) {
                Ok(target) => target,
                Err(err) => return Err(state.surface(err)),
            };
            let mut pending =
                PendingMutation::patch(MutationKind::Update, before, position, patch.clone());
            state.begin(&mut pending);
            (pending, canonical)
        };
        self.dispatch(pending, RemoteCall::Update(canonical, patch))
            .await
    }

    /// Flip `completed`.
    pub async fn toggle_complete(&self, id: &TaskId) -> Result<Task, SyncError> {
        let (pending, canonical, patch) = {
            let mut state = self.shared.lock();
            let (before, position, canonical) = match state.claim_target(id) {
                Ok(target) => target,
                Err(err) => return Err(state.surface(err)),
            };
            let patch = TaskPatch::default().completed(!before.completed);
            let mut pending = PendingMutation::patch(
                MutationKind::ToggleComplete,
                before,
                position,
                patch.clone(),
            );
            state.begin(&mut pending);
            (pending, canonical, patch)
        };
        self.dispatch(pending, RemoteCall::Update(canonical, patch))
            .await
    }

    pub async fn delete(&self, id: &TaskId) -> Result<(), SyncError> {
        let (pending, canonical) = {
            let mut state = self.shared.lock();
            let (before, position, canonical) = match state.claim_target(id) {
                Ok(target) => target,
                Err(err) => return Err(state.surface(err)),
            };
            let mut pending = PendingMutation::delete(before, position);
            state.begin(&mut pending);
            (pending, canonical)
        };
        self.dispatch(pending, RemoteCall::Delete(canonical))
            .await
            .map(|_| ())
    }

    /// Replace the store with a fresh list from the server.
    ///
    /// Refused while any mutation is in flight, so a refetch can never
    /// overwrite an optimistic entry or race a rollback. A list fetched while
    /// a mutation started or settled is discarded with `RefreshStale`.
    pub async fn refresh(&self) -> Result<usize, SyncError> {
        let generation = {
            let mut state = self.shared.lock();
            if !state.in_flight.is_empty() {
                let count = state.in_flight.len();
                return Err(state.surface(SyncError::RefreshBlocked(count)));
            }
            state.generation
        };

        let result = self.shared.remote.list_tasks().await;

        let mut state = self.shared.lock();
        let tasks = match result {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, "task list fetch failed");
                return Err(state.surface(err.into()));
            }
        };
        if !state.in_flight.is_empty() {
            let count = state.in_flight.len();
            return Err(state.surface(SyncError::RefreshBlocked(count)));
        }
        if state.generation != generation {
            warn!("discarding task list fetched across a mutation");
            return Err(state.surface(SyncError::RefreshStale));
        }
        let count = tasks.len();
        state.store.replace_all(tasks.into_iter().map(Task::from));
        state.prune_aliases();
        state.last_error = None;
        info!(count, "task list refreshed");
        Ok(count)
    }

    /// Phases 2 and 3, on a spawned task.
    async fn dispatch(
        &self,
        mut pending: PendingMutation,
        call: RemoteCall,
    ) -> Result<Task, SyncError> {
        pending.advance(MutationPhase::AwaitingRemote);
        let reconciliation = Reconciliation {
            shared: Arc::clone(&self.shared),
            pending: Some(pending),
        };

        let handle = tokio::spawn(async move {
            let result = call.send(&reconciliation.shared.remote).await;
            reconciliation.finish(result)
        });

        match handle.await {
            Ok(result) => result,
            // The guard has already rolled back and recorded the error.
            Err(join_err) => Err(SyncError::Aborted(join_err.to_string())),
        }
    }

    fn mint_local_id(&self, state: &SyncState) -> LocalId {
        loop {
            let id = self.shared.ids.next_local_id();
            if !state.knows_local(id) {
                return id;
            }
        }
    }
}

impl<R> MutationReconciler<R> {
    pub fn snapshot(&self) -> TaskSnapshot {
        self.shared.lock().store.snapshot()
    }

    /// Receives a new snapshot after every store change. Dropping the receiver
    /// (e.g. the view went away) does not affect reconciliation.
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.shared.lock().store.subscribe()
    }

    pub fn counts(&self) -> StoreCounts {
        self.shared.lock().store.counts()
    }

    /// The most recent error, for display.
    pub fn last_error(&self) -> Option<SurfacedError> {
        self.shared.lock().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.shared.lock().last_error = None;
    }

    /// Number of mutations between apply and reconciliation.
    pub fn in_flight(&self) -> usize {
        self.shared.lock().in_flight.len()
    }

    pub fn is_in_flight(&self, id: &TaskId) -> bool {
        let state = self.shared.lock();
        let id = state.resolve(id);
        state.in_flight.contains_key(&id)
    }
}
