//! App - アプリケーション層
//!
//! ports と store を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **ReconcilerBuilder**: 構築とワイヤリング
//! - **MutationReconciler**: 楽観的更新・リモート呼び出し・確定/ロールバック

pub mod builder;
pub mod reconciler;

pub use self::builder::{BuildError, ReconcilerBuilder};
pub use self::reconciler::MutationReconciler;
