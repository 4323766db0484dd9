//! Shared serial channel plumbing for Lightsweeper tile buses.
//!
//! A Lightsweeper floor hangs several tiles off each serial port. This is
//! the lowest layer of the workspace: it owns the physical port, paces
//! writes so the tile firmware keeps up, and hands out cheap [`SerialLink`]
//! handles that every tile proxy on the same port shares.
//!
//! Everything here is single-threaded by construction. A `SerialLink` is
//! not `Send`; callers that want to drive one port from several threads
//! must wrap the whole floor in their own lock.

pub mod error;
pub mod link;
pub mod port;
pub mod traits;

pub use error::{ChannelError, Result};
pub use link::{LinkConfig, SerialLink, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT, MIN_WRITE_GAP};
pub use port::{available_ports, open_link, SerialPortChannel};
pub use traits::Channel;
