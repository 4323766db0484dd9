use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// Address of a tile on its serial port.
///
/// The low three bits of the address byte carry the argument count, so a
/// real address is always a multiple of 8. There are 32 slots per port:
/// the broadcast address 0 and 31 tile addresses from 8 to 248.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct TileAddress(u8);

impl TileAddress {
    /// Every tile on the port listens here.
    pub const BROADCAST: TileAddress = TileAddress(0);

    /// Lowest address a physical tile can own.
    pub const FIRST: TileAddress = TileAddress(8);

    /// Highest address a physical tile can own.
    pub const LAST: TileAddress = TileAddress(248);

    /// Spacing between tile addresses.
    pub const STRIDE: u8 = 8;

    /// Number of non-broadcast slots on one port.
    pub const SLOTS: usize = 31;

    /// Validate a raw address.
    pub fn new(raw: u16) -> Result<Self> {
        if raw > u16::from(Self::LAST.0) || raw % u16::from(Self::STRIDE) != 0 {
            return Err(FrameError::InvalidAddress(raw));
        }
        Ok(Self(raw as u8))
    }

    /// Address of the n-th tile slot, 1 through 31.
    pub fn slot(n: u8) -> Result<Self> {
        if n == 0 || usize::from(n) > Self::SLOTS {
            return Err(FrameError::InvalidAddress(u16::from(n) * u16::from(Self::STRIDE)));
        }
        Ok(Self(n * Self::STRIDE))
    }

    /// All 31 tile addresses, 8 through 248.
    pub fn all_tiles() -> impl Iterator<Item = TileAddress> {
        (1..=Self::SLOTS as u8).map(|n| Self(n * Self::STRIDE))
    }

    /// Raw address byte (argument count bits clear).
    pub fn get(self) -> u8 {
        self.0
    }

    /// True for address 0.
    pub fn is_broadcast(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u16> for TileAddress {
    type Error = FrameError;

    fn try_from(raw: u16) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<TileAddress> for u16 {
    fn from(address: TileAddress) -> Self {
        u16::from(address.0)
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
