//! quicktask-core
//!
//! Optimistic task list client: local store plus reconciliation against a
//! REST-style backend.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, mutation, errors）
//! - **ports**: 抽象化レイヤー（TaskRemote, LocalIdGenerator, Clock）
//! - **store**: TaskStore（正本のインメモリ一覧）と PendingMutation（undo 記録）
//! - **app**: MutationReconciler（三段階プロトコル）と ReconcilerBuilder
//! - **impls**: 実装（InMemoryRemote など開発用）
//! - **config**: ClientConfig（JSON）
//! - **observability**: 集計ビュー（StoreCounts）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod store;

pub use app::{BuildError, MutationReconciler, ReconcilerBuilder};
pub use config::{ClientConfig, ConfigError};
pub use domain::{
    CanonicalId, CanonicalTask, ErrorKind, LocalId, MutationKind, NewTask, RemoteError,
    SurfacedError, SyncError, Task, TaskId, TaskPatch,
};
pub use observability::StoreCounts;
pub use store::{TaskSnapshot, TaskStore};
