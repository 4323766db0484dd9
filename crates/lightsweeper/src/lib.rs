//! Drive Lightsweeper tile floors over serial links.
//!
//! Lightsweeper floors are grids of tiles, each with a tri-color
//! seven-segment display and a pressure sensor, daisy-chained on a few
//! serial ports.
//!
//! # Crate Structure
//!
//! - [`serial`]: serial channels and the shared, write-paced link
//! - [`frame`]: wire framing, checksums, command codes, colors and shapes
//! - [`tile`]: tile proxies behind the `TileControl` trait, plus simulators
//! - [`floor`]: discovery, floor layouts and the grid orchestrator (behind
//!   the `floor` feature)

/// Re-export serial channel types.
pub mod serial {
    pub use lightsweeper_serial::*;
}

/// Re-export framing types.
pub mod frame {
    pub use lightsweeper_frame::*;
}

/// Re-export tile proxy types.
pub mod tile {
    pub use lightsweeper_tile::*;
}

/// Re-export floor types (requires `floor` feature).
#[cfg(feature = "floor")]
pub mod floor {
    pub use lightsweeper_floor::*;
}
