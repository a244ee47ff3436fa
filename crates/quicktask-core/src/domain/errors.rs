//! Errors - エラー型と分類
//!
//! # 分類
//! - **RemoteError**: リモート呼び出しの失敗（ロールバック対象）
//! - **StoreError**: TaskStore の操作エラー（ID の衝突など）
//! - **SyncError**: MutationReconciler が呼び出し元に返す構造化エラー
//!
//! リモートの失敗は MutationReconciler の境界で必ず捕捉され、
//! ロールバック後に `SyncError` として返されます。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{LocalId, TaskId};
use super::mutation::MutationKind;

/// Failure reported by the remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// No response was received.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response carrying `{ "error": ... }`.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// 401. Session invalidation is the transport's concern.
    #[error("unauthorized: {0}")]
    Auth(String),

    /// A 2xx response that does not match the request.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("cannot remap {from} to {to}: {to} already holds a different task")]
    Conflict { from: TaskId, to: TaskId },

    #[error("task not found: {0}")]
    NotFound(TaskId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Conflict(StoreError),

    #[error("task {0} is still being created; retry once the create resolves")]
    PendingCreateConflict(LocalId),

    #[error("task {id} already has an in-flight {kind} mutation")]
    InFlightConflict { id: TaskId, kind: MutationKind },

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("cannot refresh while {0} mutation(s) are in flight")]
    RefreshBlocked(usize),

    /// A mutation started or settled while the list was being fetched.
    #[error("task list changed while it was being fetched")]
    RefreshStale,

    #[error("reconciliation aborted: {0}")]
    Aborted(String),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SyncError::NotFound(id),
            conflict @ StoreError::Conflict { .. } => SyncError::Conflict(conflict),
        }
    }
}

/// Coarse classification shown next to the message in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Server,
    Auth,
    Conflict,
    PendingCreateConflict,
    InFlightConflict,
    NotFound,
    Aborted,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation { .. } => ErrorKind::Validation,
            SyncError::Remote(RemoteError::Network(_)) => ErrorKind::Network,
            SyncError::Remote(RemoteError::Server { .. })
            | SyncError::Remote(RemoteError::InvalidResponse(_)) => ErrorKind::Server,
            SyncError::Remote(RemoteError::Auth(_)) => ErrorKind::Auth,
            SyncError::Conflict(_) => ErrorKind::Conflict,
            SyncError::PendingCreateConflict(_) => ErrorKind::PendingCreateConflict,
            SyncError::InFlightConflict { .. }
            | SyncError::RefreshBlocked(_)
            | SyncError::RefreshStale => ErrorKind::InFlightConflict,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Aborted(_) => ErrorKind::Aborted,
        }
    }

    /// Whether the caller may reasonably resubmit the same intent later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network
                | ErrorKind::PendingCreateConflict
                | ErrorKind::InFlightConflict
                | ErrorKind::Aborted
        )
    }
}

/// The most recent error, in the shape the UI displays it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SyncError> for SurfacedError {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::CanonicalId;
    use rstest::rstest;

    #[rstest]
    #[case::network(RemoteError::Network("timeout".into()), ErrorKind::Network)]
    #[case::server(RemoteError::Server { status: 500, message: "boom".into() }, ErrorKind::Server)]
    #[case::auth(RemoteError::Auth("expired".into()), ErrorKind::Auth)]
    #[case::invalid(RemoteError::InvalidResponse("id mismatch".into()), ErrorKind::Server)]
    fn remote_errors_are_classified(#[case] err: RemoteError, #[case] kind: ErrorKind) {
        assert_eq!(SyncError::from(err).kind(), kind);
    }

    #[test]
    fn store_not_found_maps_to_sync_not_found() {
        let id = TaskId::Canonical(CanonicalId::new("srv-1"));
        let err = SyncError::from(StoreError::NotFound(id.clone()));
        assert_eq!(err, SyncError::NotFound(id));
    }

    #[test]
    fn surfaced_error_keeps_kind_and_message() {
        let err = SyncError::Remote(RemoteError::Server {
            status: 400,
            message: "title is required".into(),
        });
        let surfaced = SurfacedError::from(&err);

        assert_eq!(surfaced.kind, ErrorKind::Server);
        assert_eq!(surfaced.message, "server error (400): title is required");
    }

    #[rstest]
    #[case::refresh_blocked(SyncError::RefreshBlocked(2))]
    #[case::refresh_stale(SyncError::RefreshStale)]
    #[case::pending_create(SyncError::PendingCreateConflict(crate::domain::LocalId::from_ulid(ulid::Ulid::new())))]
    fn refresh_and_overlap_errors_are_retryable(#[case] err: SyncError) {
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_is_not_retryable() {
        let err = SyncError::Validation {
            field: "title",
            reason: "empty".into(),
        };
        assert!(!err.is_retryable());
        assert!(SyncError::from(RemoteError::Network("down".into())).is_retryable());
    }
}
