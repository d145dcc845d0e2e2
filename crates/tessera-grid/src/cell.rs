//! Cell identity and per-cell state.
//!
//! Cell ids are row-major: `id = y * WIDTH + x`. Every cell exists from
//! startup; events only ever overwrite fields.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::order::OrderKey;
use crate::stake::Stake;
use crate::{CELL_COUNT, HEIGHT, WIDTH};

/// A row-major cell index in `[0, WIDTH * HEIGHT)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub u32);

impl CellId {
    /// Build an id from grid coordinates, `None` outside the grid.
    pub const fn from_xy(x: u32, y: u32) -> Option<Self> {
        if x < WIDTH && y < HEIGHT {
            Some(Self(y * WIDTH + x))
        } else {
            None
        }
    }

    /// Build an id from a raw integer, `None` outside the grid.
    pub fn checked(raw: i64) -> Option<Self> {
        if (0..CELL_COUNT as i64).contains(&raw) {
            Some(Self(raw as u32))
        } else {
            None
        }
    }

    /// Column of this cell.
    pub const fn x(&self) -> u32 {
        self.0 % WIDTH
    }

    /// Row of this cell.
    pub const fn y(&self) -> u32 {
        self.0 / WIDTH
    }

    /// Whether the id addresses a cell of the grid.
    pub const fn is_valid(&self) -> bool {
        (self.0 as usize) < CELL_COUNT
    }

    /// Position in the store's cell table.
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Every cell id in id order.
    pub fn all() -> impl Iterator<Item = CellId> {
        (0..CELL_COUNT as u32).map(CellId)
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A packed 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u32")]
pub struct Color(u32);

impl Color {
    /// Unstaked cells are black.
    pub const BLACK: Self = Self(0x000000);

    /// Largest representable color.
    pub const MAX: u32 = 0xFF_FF_FF;

    /// Create a color, rejecting values wider than 24 bits.
    pub fn new(rgb: u64) -> Result<Self> {
        if rgb <= Self::MAX as u64 {
            Ok(Self(rgb as u32))
        } else {
            Err(Error::InvalidColor(rgb))
        }
    }

    /// Create a color from a literal known to fit.
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Packed RGB value.
    pub const fn rgb(&self) -> u32 {
        self.0
    }

    /// CSS-style `#rrggbb`.
    pub fn to_hex_string(&self) -> String {
        format!("#{:06x}", self.0)
    }
}

impl TryFrom<u64> for Color {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Color> for u32 {
    fn from(c: Color) -> Self {
        c.0
    }
}

/// A lower-cased account address (`0x` + 40 hex digits).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    const HEX_LEN: usize = 40;

    /// Parse and normalize an address.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| Error::InvalidAddress(raw.to_string()))?;
        if digits.len() != Self::HEX_LEN || hex::decode(digits).is_err() {
            return Err(Error::InvalidAddress(raw.to_string()));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// The zero address owning every unstaked cell.
    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(Self::HEX_LEN)))
    }

    /// Whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    /// The normalized text form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for compact displays, e.g. `0x123...cdef`.
    pub fn short(&self) -> String {
        let n = 3;
        format!("{}...{}", &self.0[..n + 2], &self.0[self.0.len() - n - 1..])
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A lower-cased transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    /// Parse and normalize a `0x`-prefixed hex hash.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| Error::InvalidHash(raw.to_string()))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidHash(raw.to_string()));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// Hash carried by cells no transaction has touched.
    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(64)))
    }

    /// The normalized text form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TxHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TxHash> for String {
    fn from(h: TxHash) -> Self {
        h.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order keys of the events that last wrote each field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FieldKeys {
    color: Option<OrderKey>,
    owner: Option<OrderKey>,
    stake: Option<OrderKey>,
    tx: Option<OrderKey>,
}

/// Whether an event with `key` may overwrite a field last written at `current`.
fn wins(key: &OrderKey, current: &Option<OrderKey>) -> bool {
    current.as_ref().map_or(true, |c| key >= c)
}

/// State of one grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub id: CellId,
    pub x: u32,
    pub y: u32,
    pub color: Color,
    pub stake: Stake,
    pub owner: Address,
    pub last_tx: TxHash,
    keys: FieldKeys,
}

impl Cell {
    /// A cell in its startup state: black, unstaked, owned by the zero address.
    pub fn empty(id: CellId) -> Self {
        Self {
            id,
            x: id.x(),
            y: id.y(),
            color: Color::BLACK,
            stake: Stake::ZERO,
            owner: Address::zero(),
            last_tx: TxHash::zero(),
            keys: FieldKeys::default(),
        }
    }

    /// Whether the visible fields of two cells agree.
    pub fn same_state(&self, other: &Cell) -> bool {
        self.color == other.color
            && self.stake == other.stake
            && self.owner == other.owner
            && self.last_tx == other.last_tx
    }

    /// Order key of the newest event that touched this cell, if any.
    pub fn last_key(&self) -> Option<OrderKey> {
        [self.keys.color, self.keys.owner, self.keys.stake, self.keys.tx]
            .into_iter()
            .flatten()
            .max()
    }

    /// Fold one delta into the cell, field by field, last writer wins.
    ///
    /// A field is overwritten only when `event.key` is at least the key that
    /// last wrote it.
    pub fn absorb(&mut self, event: &crate::CellEvent) {
        let key = event.key;
        if let Some(color) = event.color {
            if wins(&key, &self.keys.color) {
                self.color = color;
                self.keys.color = Some(key);
            }
        }
        if let Some(owner) = &event.owner {
            if wins(&key, &self.keys.owner) {
                self.owner = owner.clone();
                self.keys.owner = Some(key);
            }
        }
        if let Some(stake) = event.stake {
            if wins(&key, &self.keys.stake) {
                self.stake = stake;
                self.keys.stake = Some(key);
            }
        }
        if wins(&key, &self.keys.tx) {
            self.last_tx = event.tx_hash.clone();
            self.keys.tx = Some(key);
        }
    }
}
