//! InMemoryRemote - 開発・テスト用のサーバー実装
//!
//! # 学習ポイント
//! - サーバー側の正規化（trim、空の description → null、created_at の付与）
//! - 障害注入（fail_next）でロールバック経路を再現
//! - pause/resume と wait_for_calls で「リクエスト送信中」の状態をテストから作る

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{CanonicalId, CanonicalTask, NewTask, RemoteError, TaskPatch};
use crate::ports::{Clock, SystemClock, TaskRemote};

struct ServerState {
    tasks: Vec<CanonicalTask>,
    next_id: u64,
    failures: VecDeque<RemoteError>,
}

/// InMemoryRemote は REST バックエンドの振る舞いを再現する
///
/// # 実装詳細
/// - ID は `srv-1`, `srv-2`, ... の連番
/// - Mutex はロック中に await しない
/// - `paused` / `calls` は watch channel で待ち合わせる
///
/// # 使用例
/// ```ignore
/// let remote = InMemoryRemote::new();
/// remote.pause();
/// // ... intent を発行（リモート呼び出しで停止する）
/// remote.wait_for_calls(1).await;
/// remote.fail_next(RemoteError::Network("offline".into()));
/// remote.resume();
/// ```
pub struct InMemoryRemote {
    state: Mutex<ServerState>,
    clock: Box<dyn Clock>,
    latency: Duration,
    paused: watch::Sender<bool>,
    calls: watch::Sender<usize>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState {
                tasks: Vec::new(),
                next_id: 1,
                failures: VecDeque::new(),
            }),
            clock: Box::new(SystemClock),
            latency: Duration::ZERO,
            paused: watch::Sender::new(false),
            calls: watch::Sender::new(0),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Simulated round-trip time added to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Insert a task directly on the server side (not counted as a call).
    pub fn seed(&self, draft: &NewTask) -> Result<CanonicalTask, RemoteError> {
        let mut state = self.lock();
        let task = self.normalize_new(&mut state, draft)?;
        state.tasks.push(task.clone());
        Ok(task)
    }

    /// The next call fails with `err`. Failures queue up in order.
    pub fn fail_next(&self, err: RemoteError) {
        self.lock().failures.push_back(err);
    }

    /// Hold every call until `resume`.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn call_count(&self) -> usize {
        *self.calls.borrow()
    }

    /// Wait until at least `n` calls have arrived (paused ones included).
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.calls.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    /// Server-side view of the data.
    pub fn tasks(&self) -> Vec<CanonicalTask> {
        self.lock().tasks.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call, honour pause and latency, then consume an injected failure.
    async fn enter(&self) -> Result<(), RemoteError> {
        self.calls.send_modify(|count| *count += 1);

        let mut paused = self.paused.subscribe();
        paused
            .wait_for(|paused| !*paused)
            .await
            .map_err(|_| RemoteError::Network("server went away".to_string()))?;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.lock().failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn normalize_new(
        &self,
        state: &mut ServerState,
        draft: &NewTask,
    ) -> Result<CanonicalTask, RemoteError> {
        let title = normalize_title(&draft.title)?;
        let id = CanonicalId::new(format!("srv-{}", state.next_id));
        state.next_id += 1;
        Ok(CanonicalTask {
            id,
            title,
            description: normalize_description(draft.description.as_deref()),
            completed: false,
            created_at: Some(self.clock.now()),
        })
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_title(title: &str) -> Result<String, RemoteError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(RemoteError::Server {
            status: 400,
            message: "title is required".to_string(),
        });
    }
    Ok(title.to_string())
}

fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

fn not_found(id: &CanonicalId) -> RemoteError {
    RemoteError::Server {
        status: 404,
        message: format!("task {id} not found"),
    }
}

#[async_trait]
impl TaskRemote for InMemoryRemote {
    async fn create_task(&self, payload: &NewTask) -> Result<CanonicalTask, RemoteError> {
        self.enter().await?;
        let mut state = self.lock();
        let task = self.normalize_new(&mut state, payload)?;
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(
        &self,
        id: &CanonicalId,
        payload: &TaskPatch,
    ) -> Result<CanonicalTask, RemoteError> {
        self.enter().await?;
        let title = payload.title.as_deref().map(normalize_title).transpose()?;

        let mut state = self.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|task| &task.id == id)
            .ok_or_else(|| not_found(id))?;
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = &payload.description {
            task.description = normalize_description(description.as_deref());
        }
        if let Some(completed) = payload.completed {
            task.completed = completed;
        }
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &CanonicalId) -> Result<(), RemoteError> {
        self.enter().await?;
        let mut state = self.lock();
        let index = state
            .tasks
            .iter()
            .position(|task| &task.id == id)
            .ok_or_else(|| not_found(id))?;
        state.tasks.remove(index);
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<CanonicalTask>, RemoteError> {
        self.enter().await?;
        Ok(self.lock().tasks.clone())
    }
}
