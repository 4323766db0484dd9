//! Floor-level orchestration for Lightsweeper tiles.
//!
//! - [`Discovery`] finds serial ports with tiles on them, surveys the 31
//!   addresses of each, and keeps the opened links in a [`ChannelRegistry`].
//! - [`FloorLayout`] is the JSON descriptor mapping grid cells to
//!   `(channel, address)` pairs.
//! - [`Floor`] owns a [`Grid`] of tile proxies and applies batch operations
//!   and sensor polling across it. A channel that fails is marked dead and
//!   skipped until revived, so one unplugged port doesn't stop the floor.
//!
//! Rows and columns are 1-based everywhere; 0 selects a whole row/column.

pub mod config;
pub mod discovery;
pub mod error;
pub mod floor;
pub mod grid;
pub mod layout;
pub mod registry;

pub use config::FloorConfig;
pub use discovery::{Discovery, PortFailure, PortMap, PortOpener, SurveyReport, SystemPorts};
pub use error::{FloorError, Result};
pub use floor::{Floor, SensorEvent};
pub use grid::{Grid, Position};
pub use layout::{FloorLayout, TilePlacement};
pub use registry::ChannelRegistry;
