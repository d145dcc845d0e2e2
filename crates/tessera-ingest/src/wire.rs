//! Wire records returned by the snapshot, history and summary endpoints.
//!
//! Amounts are fixed-point integers scaled by 10^18. Upstream sends them as
//! JSON strings or JSON numbers depending on the endpoint, so both are
//! accepted.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use tessera_grid::{Address, CellEvent, CellId, Color, OrderKey, Stake, TxHash};

use crate::error::{Error, Result};
use crate::history::HistoryEntry;

/// A fixed-point amount as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct RawAmount(pub Stake);

impl From<RawAmount> for String {
    fn from(a: RawAmount) -> Self {
        a.0.base_units().to_string()
    }
}

impl<'de> Deserialize<'de> for RawAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = RawAmount;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a non-negative integer amount as a string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<RawAmount, E> {
                Stake::parse_base_units(v).map(RawAmount).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<RawAmount, E> {
                Ok(RawAmount(Stake::from_base_units(v as u128)))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> std::result::Result<RawAmount, E> {
                Ok(RawAmount(Stake::from_base_units(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<RawAmount, E> {
                u64::try_from(v)
                    .map(|v| RawAmount(Stake::from_base_units(v as u128)))
                    .map_err(|_| E::custom(format!("negative amount {v}")))
            }

            // Integers past u64 arrive as floats unless the parser keeps
            // arbitrary precision.
            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<RawAmount, E> {
                if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
                    Ok(RawAmount(Stake::from_base_units(v as u128)))
                } else {
                    Err(E::custom(format!("amount {v} is not a non-negative integer")))
                }
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Parse an upstream timestamp: RFC 3339, or a naive ISO datetime taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| Error::malformed(format!("unparsable timestamp {raw:?}")))
}

fn cell_id(raw: i64) -> Result<CellId> {
    CellId::checked(raw).ok_or_else(|| Error::malformed(format!("cell id {raw} outside the grid")))
}

/// One row of the full snapshot: the cumulative state of a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: i64,
    pub color: u64,
    pub stake_amount: RawAmount,
    pub owner: String,
    #[serde(default)]
    pub hash: Option<String>,
}

impl SnapshotRecord {
    /// Convert into a delta carrying every field, ordered at `key`.
    ///
    /// Rows carry no log position of their own; callers key them with
    /// [`OrderKey::snapshot`] at the instant the fetch started.
    pub fn to_event(&self, key: OrderKey) -> Result<CellEvent> {
        let tx = match &self.hash {
            Some(h) => TxHash::parse(h).map_err(Error::malformed)?,
            None => TxHash::zero(),
        };
        Ok(CellEvent::new(cell_id(self.id)?, key, tx)
            .with_color(Color::new(self.color).map_err(Error::malformed)?)
            .with_owner(Address::parse(&self.owner).map_err(Error::malformed)?)
            .with_stake(self.stake_amount.0))
    }
}

/// One entry of a cell's event history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub log_index: u32,
    pub hash: String,
    pub pixel_id: i64,
    pub stake_amount: RawAmount,
    pub color: u64,
    pub owner: String,
    pub timestamp: String,
}

impl HistoryRecord {
    /// Validate into a history entry.
    pub fn to_entry(&self) -> Result<HistoryEntry> {
        let key = OrderKey::new(parse_timestamp(&self.timestamp)?, self.log_index);
        Ok(HistoryEntry {
            cell: cell_id(self.pixel_id)?,
            key,
            tx_hash: TxHash::parse(&self.hash).map_err(Error::malformed)?,
            color: Color::new(self.color).map_err(Error::malformed)?,
            owner: Address::parse(&self.owner).map_err(Error::malformed)?,
            stake: self.stake_amount.0,
        })
    }
}

/// Summary of an owner/project as returned by the summary endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub address: String,
    pub balance: RawAmount,
    #[serde(default)]
    pub best_row: Option<u32>,
    #[serde(default)]
    pub best_col: Option<u32>,
    #[serde(default)]
    pub best_cost: Option<RawAmount>,
    #[serde(default)]
    pub gas_used: Option<RawAmount>,
    #[serde(default)]
    pub gas_available: Option<RawAmount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "0xAbCdEf0000000000000000000000000000000001";

    #[test]
    fn amount_accepts_string_and_number() {
        let s: RawAmount = serde_json::from_str("\"1000000000000000000\"").unwrap();
        let n: RawAmount = serde_json::from_str("1000000000000000000").unwrap();
        assert_eq!(s, n);
        assert_eq!(s.0.as_decimal(), 1.0);
        assert!(serde_json::from_str::<RawAmount>("-1").is_err());
        assert!(serde_json::from_str::<RawAmount>("\"abc\"").is_err());
        assert!(serde_json::from_str::<RawAmount>("1.5").is_err());
    }

    #[test]
    fn snapshot_row_becomes_full_event() {
        let json = format!(
            r#"{{"id": 5150, "color": 16711680, "stake_amount": "1000000000000000000", "owner": "{OWNER}", "hash": "0xDEAD"}}"#
        );
        let row: SnapshotRecord = serde_json::from_str(&json).unwrap();
        let key = OrderKey::snapshot(parse_timestamp("2024-05-01T12:00:00Z").unwrap());
        let ev = row.to_event(key).unwrap();
        assert_eq!(ev.cell, CellId(5150));
        assert_eq!(ev.key, key);
        assert_eq!(ev.color, Some(Color::new(0xFF0000).unwrap()));
        assert_eq!(ev.owner.unwrap().as_str(), OWNER.to_ascii_lowercase());
        assert_eq!(ev.tx_hash.as_str(), "0xdead");
    }

    #[test]
    fn snapshot_row_rejects_bad_fields() {
        let key = OrderKey::snapshot(Utc::now());
        let mut row = SnapshotRecord {
            id: 10_000,
            color: 0,
            stake_amount: RawAmount(Stake::ZERO),
            owner: OWNER.into(),
            hash: None,
        };
        assert!(matches!(row.to_event(key), Err(Error::MalformedEvent(_))));
        row.id = 1;
        row.color = 0x1_000_000;
        assert!(matches!(row.to_event(key), Err(Error::MalformedEvent(_))));
        row.color = 0;
        row.owner = "not-an-address".into();
        assert!(matches!(row.to_event(key), Err(Error::MalformedEvent(_))));
    }

    #[test]
    fn history_timestamps_with_and_without_offset() {
        let a = parse_timestamp("2024-05-01T12:00:00Z").unwrap();
        let b = parse_timestamp("2024-05-01T12:00:00").unwrap();
        let c = parse_timestamp("2024-05-01T14:00:00+02:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn history_record_to_entry() {
        let json = format!(
            r#"{{"log_index": 4, "hash": "0x01", "pixel_id": 7, "stake_amount": 5, "color": 255, "owner": "{OWNER}", "timestamp": "2024-05-01T12:00:00.250Z"}}"#
        );
        let rec: HistoryRecord = serde_json::from_str(&json).unwrap();
        let entry = rec.to_entry().unwrap();
        assert_eq!(entry.cell, CellId(7));
        assert_eq!(entry.key.log_index, 4);
        assert_eq!(entry.stake, Stake::from_base_units(5));
    }
}
