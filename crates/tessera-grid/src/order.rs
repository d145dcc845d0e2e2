//! Total order over events touching the same cell.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `(timestamp, log_index)` ordering key.
///
/// Block timestamps have one-second resolution, so many events share a
/// timestamp; `log_index` (position within the block) breaks the tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub timestamp: DateTime<Utc>,
    pub log_index: u32,
}

impl OrderKey {
    /// Create a key.
    pub const fn new(timestamp: DateTime<Utc>, log_index: u32) -> Self {
        Self { timestamp, log_index }
    }

    /// Key given to snapshot rows fetched starting at `fetched_at`.
    ///
    /// Sorts after every event logged up to that instant, so a snapshot
    /// corrects what older events wrote and yields to anything newer.
    pub const fn snapshot(fetched_at: DateTime<Utc>) -> Self {
        Self::new(fetched_at, u32::MAX)
    }

    /// Create a key from a unix block timestamp in seconds.
    pub fn from_unix(seconds: i64, log_index: u32) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(seconds, 0).map(|timestamp| Self { timestamp, log_index })
    }

    /// Stable textual id, `"<rfc3339>-<log_index>"`.
    pub fn id(&self) -> String {
        format!("{}-{}", self.timestamp.to_rfc3339(), self.log_index)
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.timestamp.timestamp(), self.log_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_index_breaks_timestamp_ties() {
        let a = OrderKey::from_unix(1_700_000_000, 3).unwrap();
        let b = OrderKey::from_unix(1_700_000_000, 5).unwrap();
        let c = OrderKey::from_unix(1_700_000_001, 0).unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn snapshot_key_sorts_between_its_instant_and_the_next() {
        let at = OrderKey::from_unix(1_700_000_000, 0).unwrap().timestamp;
        let snap = OrderKey::snapshot(at);
        assert!(OrderKey::new(at, 9_999) < snap);
        assert!(snap < OrderKey::from_unix(1_700_000_001, 0).unwrap());
    }
}
