//! Live push feed decoding.
//!
//! Each feed entry is one decoded contract log. Batch kinds carry parallel
//! arrays and expand to one [`CellEvent`] per cell, all sharing the entry's
//! order key.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tessera_grid::{Address, CellEvent, CellId, Color, OrderKey, Stake, TxHash};

use crate::error::{Error, Result};
use crate::wire::RawAmount;

/// A decoded log entry as delivered by the push subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub event_name: String,
    /// Block timestamp in unix seconds.
    pub block_timestamp: i64,
    pub transaction_hash: String,
    pub log_index: u32,
    #[serde(default)]
    pub args: Value,
}

/// What a feed entry means once decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Deltas for one or more cells.
    Cells(Vec<CellEvent>),
    /// A new project was deployed; its summary is worth refreshing.
    ProjectCreated { creator: Address, project: Address },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StakedArgs {
    staker: String,
    pixel_id: i64,
    amount: RawAmount,
    color: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchStakedArgs {
    staker: String,
    pixel_ids: Vec<i64>,
    amounts: Vec<RawAmount>,
    colors: Vec<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnstakedArgs {
    staker: String,
    pixel_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchUnstakedArgs {
    staker: String,
    pixel_ids: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColorArgs {
    pixel_id: i64,
    color: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchColorArgs {
    pixel_ids: Vec<i64>,
    colors: Vec<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectCreatedArgs {
    creator: String,
    project_address: String,
}

fn args<T: DeserializeOwned>(entry: &FeedEntry) -> Result<T> {
    serde_json::from_value(entry.args.clone())
        .map_err(|e| Error::malformed(format!("{} args: {e}", entry.event_name)))
}

fn cell(raw: i64) -> Result<CellId> {
    CellId::checked(raw).ok_or_else(|| Error::malformed(format!("cell id {raw} outside the grid")))
}

fn color(raw: u64) -> Result<Color> {
    Color::new(raw).map_err(Error::malformed)
}

fn address(raw: &str) -> Result<Address> {
    Address::parse(raw).map_err(Error::malformed)
}

fn same_len(what: &str, a: usize, b: usize) -> Result<()> {
    if a == b {
        Ok(())
    } else {
        Err(Error::malformed(format!("{what}: {a} ids but {b} values")))
    }
}

impl FeedEntry {
    /// Order key shared by every cell this entry touches.
    pub fn order_key(&self) -> Result<OrderKey> {
        OrderKey::from_unix(self.block_timestamp, self.log_index).ok_or_else(|| {
            Error::malformed(format!("block timestamp {} out of range", self.block_timestamp))
        })
    }

    /// Decode into cell deltas or a project notice.
    ///
    /// Any invalid part (array length mismatch, id outside the grid, bad
    /// address, color wider than 24 bits, bad amount) rejects the entry
    /// whole; nothing from it is applied.
    pub fn decode(&self) -> Result<FeedEvent> {
        let key = self.order_key()?;
        let tx = TxHash::parse(&self.transaction_hash).map_err(Error::malformed)?;
        let base = |id: CellId| CellEvent::new(id, key, tx.clone());

        let events = match self.event_name.as_str() {
            "PixelStaked" => {
                let a: StakedArgs = args(self)?;
                vec![base(cell(a.pixel_id)?)
                    .with_color(color(a.color)?)
                    .with_owner(address(&a.staker)?)
                    .with_stake(a.amount.0)]
            }
            "PixelsStaked" => {
                let a: BatchStakedArgs = args(self)?;
                same_len("PixelsStaked amounts", a.pixel_ids.len(), a.amounts.len())?;
                same_len("PixelsStaked colors", a.pixel_ids.len(), a.colors.len())?;
                let owner = address(&a.staker)?;
                a.pixel_ids
                    .iter()
                    .zip(&a.amounts)
                    .zip(&a.colors)
                    .map(|((&id, amount), &c)| -> Result<CellEvent> {
                        Ok(base(cell(id)?)
                            .with_color(color(c)?)
                            .with_owner(owner.clone())
                            .with_stake(amount.0))
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            "PixelUnstaked" => {
                let a: UnstakedArgs = args(self)?;
                vec![unstake(base(cell(a.pixel_id)?), address(&a.staker)?)]
            }
            "PixelsUnstaked" => {
                let a: BatchUnstakedArgs = args(self)?;
                let owner = address(&a.staker)?;
                a.pixel_ids
                    .iter()
                    .map(|&id| -> Result<CellEvent> { Ok(unstake(base(cell(id)?), owner.clone())) })
                    .collect::<Result<Vec<_>>>()?
            }
            "PixelColorChanged" => {
                let a: ColorArgs = args(self)?;
                vec![base(cell(a.pixel_id)?).with_color(color(a.color)?)]
            }
            "PixelsColorChanged" => {
                let a: BatchColorArgs = args(self)?;
                same_len("PixelsColorChanged colors", a.pixel_ids.len(), a.colors.len())?;
                a.pixel_ids
                    .iter()
                    .zip(&a.colors)
                    .map(|(&id, &c)| -> Result<CellEvent> { Ok(base(cell(id)?).with_color(color(c)?)) })
                    .collect::<Result<Vec<_>>>()?
            }
            "ProjectCreated" => {
                let a: ProjectCreatedArgs = args(self)?;
                return Ok(FeedEvent::ProjectCreated {
                    creator: address(&a.creator)?,
                    project: address(&a.project_address)?,
                });
            }
            other => return Err(Error::malformed(format!("unknown event {other:?}"))),
        };
        Ok(FeedEvent::Cells(events))
    }
}

// Unstaking blanks the cell but records the staker as its owner.
fn unstake(event: CellEvent, staker: Address) -> CellEvent {
    event
        .with_color(Color::BLACK)
        .with_owner(staker)
        .with_stake(Stake::ZERO)
}
