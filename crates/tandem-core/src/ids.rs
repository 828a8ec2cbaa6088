//! Queue identifiers.
//!
//! # ULID ベースの ID
//! キューごとに ULID を 1 つ割り当て、ログ上で複数のキューを区別できるようにします。
//! - **時刻でソート可能**: 生成順序でソートできる
//! - **調整不要**: 生成にロックや共有状態を必要としない

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of one `SequentialQueue` instance.
///
/// Clones of a queue share the same id; separately constructed queues never do.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueId(Ulid);

impl QueueId {
    /// 新しい ID を生成
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for QueueId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = QueueId::generate();
        let b = QueueId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn display_has_prefix() {
        let ulid = Ulid::new();
        let id = QueueId::from(ulid);
        assert_eq!(id.as_ulid(), ulid);
        assert_eq!(id.to_string(), format!("queue-{ulid}"));
    }

    #[test]
    fn ids_can_be_serialized() {
        let id = QueueId::generate();
        let serialized = serde_json::to_string(&id).unwrap();
        let deserialized: QueueId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id, deserialized);
    }
}
