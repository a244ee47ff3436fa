//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（REST サーバー、時刻、ID 発行）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod id_generator;
pub mod remote;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{LocalIdGenerator, UlidGenerator};
pub use self::remote::TaskRemote;
