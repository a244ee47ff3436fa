//! IdGenerator port - ローカル ID 生成の抽象化
//!
//! 楽観的追加で使う仮 ID を発行します。
//! テスト容易性のために、trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::LocalId;
use crate::ports::Clock;
use ulid::Ulid;

/// LocalIdGenerator はセッション内で一意な仮 ID を生成
///
/// # ULID の特性
/// - 時刻でソート可能
/// - 80-bit のランダム部分により、同一ミリ秒でも衝突しない
/// - サーバーの ID とは型が異なるので、正式 ID と混同されない
pub trait LocalIdGenerator: Send + Sync {
    fn next_local_id(&self) -> LocalId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// これにより、テスト時に FixedClock を使って timestamp 部分を固定できます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> LocalIdGenerator for UlidGenerator<C> {
    fn next_local_id(&self) -> LocalId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        LocalId::from(ulid)
    }
}
