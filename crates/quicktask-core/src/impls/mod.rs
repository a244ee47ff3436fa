//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryRemote**: REST バックエンドを模したインメモリのサーバー
//!
//! HTTP クライアントなど本番用のトランスポートは別クレートに置く想定です。

pub mod inmem_remote;

pub use self::inmem_remote::InMemoryRemote;
