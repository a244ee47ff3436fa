//! Task identifiers.
//!
//! # Local と Canonical
//! タスクの ID は常にどちらか一方です：
//! - **LocalId**: クライアントが楽観的追加のために発行する仮 ID（ULID ベース、サーバーには送らない）
//! - **CanonicalId**: サーバーが割り当てる正式な ID（グローバルに安定）
//!
//! `TaskId` はこの 2 つを enum で包み、どちらの ID かを型で区別します。
//! リモート呼び出しは `CanonicalId` しか受け取らないので、
//! ローカル ID がサーバーに漏れることはコンパイル時に防がれます。

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use ulid::Ulid;

/// Client-minted placeholder id, valid until the create is reconciled.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(Ulid);

impl LocalId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for LocalId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local-{}", self.0)
    }
}

/// Server-assigned id.
///
/// Always serialized as a string. Deserialization also accepts a JSON integer,
/// since the backend hands out auto-increment row ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for CanonicalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Number(n) => Self(n.to_string()),
        })
    }
}

/// Key of an entry in the task store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskId {
    Local(LocalId),
    Canonical(CanonicalId),
}

impl TaskId {
    pub fn is_local(&self) -> bool {
        matches!(self, TaskId::Local(_))
    }

    pub fn as_canonical(&self) -> Option<&CanonicalId> {
        match self {
            TaskId::Canonical(id) => Some(id),
            TaskId::Local(_) => None,
        }
    }
}

impl From<LocalId> for TaskId {
    fn from(id: LocalId) -> Self {
        TaskId::Local(id)
    }
}

impl From<CanonicalId> for TaskId {
    fn from(id: CanonicalId) -> Self {
        TaskId::Canonical(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Local(id) => id.fmt(f),
            TaskId::Canonical(id) => id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_and_canonical_ids_never_compare_equal() {
        let local = TaskId::from(LocalId::from_ulid(Ulid::new()));
        let canonical = TaskId::from(CanonicalId::new("srv-1"));

        assert_ne!(local, canonical);
        assert!(local.is_local());
        assert!(!canonical.is_local());
        assert_eq!(canonical.as_canonical(), Some(&CanonicalId::new("srv-1")));
        assert_eq!(local.as_canonical(), None);
    }

    #[test]
    fn display_prefixes_local_ids() {
        let ulid = Ulid::new();
        let local = TaskId::from(LocalId::from_ulid(ulid));
        assert_eq!(local.to_string(), format!("local-{ulid}"));

        let canonical = TaskId::from(CanonicalId::new("srv-7"));
        assert_eq!(canonical.to_string(), "srv-7");
    }

    #[test]
    fn canonical_id_accepts_integer_and_string_json() {
        let from_number: CanonicalId = serde_json::from_str("42").unwrap();
        let from_text: CanonicalId = serde_json::from_str("\"srv-42\"").unwrap();

        assert_eq!(from_number, CanonicalId::new("42"));
        assert_eq!(from_text, CanonicalId::new("srv-42"));
        assert_eq!(serde_json::to_string(&from_number).unwrap(), "\"42\"");
    }

    #[test]
    fn local_id_size_matches_ulid() {
        use std::mem::size_of;
        assert_eq!(size_of::<LocalId>(), size_of::<Ulid>());
    }
}
