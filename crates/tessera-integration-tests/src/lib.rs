//! Shared fixtures for the cross-crate tests under `tests/`.

use async_trait::async_trait;
use serde_json::{json, Value};

use tessera_grid::{Address, CellEvent, CellId, Color, OrderKey, Stake, TxHash};
use tessera_view::{DVec2, SurfaceHost};

/// Surface host that always reports the same size.
pub struct FixedHost(pub DVec2);

impl FixedHost {
    pub fn new(width: f64, height: f64) -> Self {
        Self(DVec2::new(width, height))
    }
}

#[async_trait]
impl SurfaceHost for FixedHost {
    async fn create_surface(&self) -> tessera_view::Result<DVec2> {
        Ok(self.0)
    }
}

/// Deterministic test address `0x000…0n`.
pub fn address(n: u8) -> Address {
    Address::parse(&format!("0x{:040x}", n)).unwrap()
}

pub fn key(seconds: i64, log_index: u32) -> OrderKey {
    OrderKey::from_unix(seconds, log_index).unwrap()
}

/// A full-valued delta for `cell`.
pub fn full_event(cell: u32, key: OrderKey, owner: u8, color: u32, stake: u128) -> CellEvent {
    CellEvent::new(CellId(cell), key, TxHash::zero())
        .with_owner(address(owner))
        .with_color(Color::new(color as u64).unwrap())
        .with_stake(Stake::from_base_units(stake))
}

/// A `PixelStaked` feed value as the push feed delivers it.
pub fn staked_json(cell: u32, seconds: i64, log_index: u32, owner: u8, tokens: u64, color: u32) -> Value {
    json!({
        "eventName": "PixelStaked",
        "blockTimestamp": seconds,
        "transactionHash": format!("0x{:064x}", seconds),
        "logIndex": log_index,
        "args": {
            "staker": address(owner).as_str(),
            "pixelId": cell,
            "amount": Stake::from_tokens(tokens).base_units().to_string(),
            "color": color,
        }
    })
}
