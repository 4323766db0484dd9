//! Stateful proxies for Lightsweeper tiles.
//!
//! A tile proxy turns calls like "show a red 4" into frames on the tile's
//! serial link, caching what it last wrote so repeated calls cost nothing
//! on the wire. Game and floor code only see the [`TileControl`] trait;
//! [`RealTile`] drives hardware and [`SimulatedTile`] keeps the same state
//! in memory.
//!
//! The [`bus`] module simulates tile firmware behind a
//! [`Channel`](lightsweeper_serial::Channel), for exercising the real proxy
//! and discovery code without hardware.

pub mod bus;
pub mod control;
pub mod error;
pub mod real;
pub mod simulated;
pub mod state;

pub use bus::{BusHandle, SimulatedBus, VirtualTile};
pub use control::{TileControl, NO_CONTACT};
pub use error::{Result, TileError};
pub use real::{AddressOverride, RealTile, RESET_SETTLE};
pub use simulated::SimulatedTile;
pub use state::{AdcStats, TileState, TileStatus};
