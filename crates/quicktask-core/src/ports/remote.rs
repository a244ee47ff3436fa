//! TaskRemote port - サーバー（正本）への REST 呼び出しの抽象化
//!
//! HTTP トランスポート、リトライ、認証トークンの付与は実装側の責務です。
//! MutationReconciler はこの trait だけに依存します。

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{CanonicalId, CanonicalTask, NewTask, RemoteError, TaskPatch};

/// The server of record.
///
/// Only canonical ids cross this boundary: a local id cannot be passed in and
/// cannot come back out.
#[async_trait]
pub trait TaskRemote: Send + Sync {
    /// `POST /tasks`
    async fn create_task(&self, payload: &NewTask) -> Result<CanonicalTask, RemoteError>;

    /// `PUT /tasks/<id>`
    async fn update_task(
        &self,
        id: &CanonicalId,
        payload: &TaskPatch,
    ) -> Result<CanonicalTask, RemoteError>;

    /// `DELETE /tasks/<id>`
    async fn delete_task(&self, id: &CanonicalId) -> Result<(), RemoteError>;

    /// `GET /tasks`
    async fn list_tasks(&self) -> Result<Vec<CanonicalTask>, RemoteError>;
}

#[async_trait]
impl<T: TaskRemote + ?Sized> TaskRemote for Arc<T> {
    async fn create_task(&self, payload: &NewTask) -> Result<CanonicalTask, RemoteError> {
        (**self).create_task(payload).await
    }

    async fn update_task(
        &self,
        id: &CanonicalId,
        payload: &TaskPatch,
    ) -> Result<CanonicalTask, RemoteError> {
        (**self).update_task(id, payload).await
    }

    async fn delete_task(&self, id: &CanonicalId) -> Result<(), RemoteError> {
        (**self).delete_task(id).await
    }

    async fn list_tasks(&self) -> Result<Vec<CanonicalTask>, RemoteError> {
        (**self).list_tasks().await
    }
}
