//! Wire codec for the Lightsweeper tile protocol.
//!
//! Tiles are addressed on a shared serial bus. Every frame starts with one
//! address byte whose high five bits select the tile and whose low three
//! bits carry the number of argument bytes after the command:
//! - No length field and no delimiters; the receiver sizes the frame from
//!   the first byte alone
//! - Address 0 is the broadcast address for every tile on the port
//! - Commands that must not be misread (EEPROM write, random address)
//!   carry a trailing checksum
//!
//! The codec is pure. It never touches a port.

pub mod address;
pub mod codec;
pub mod command;
pub mod display;
pub mod error;
pub mod segment;

pub use address::TileAddress;
pub use codec::{
    argc_of, checksum, decode_frame, encode_checksummed, encode_frame, verify_checksum, Frame,
    MAX_ARGS,
};
pub use display::{Color, Shape};
pub use error::{FrameError, Result};
pub use segment::{segment_command, Condition, SegmentCommand};
