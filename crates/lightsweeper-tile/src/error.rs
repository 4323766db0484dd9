use lightsweeper_frame::{FrameError, TileAddress};
use lightsweeper_serial::ChannelError;

/// Errors that can occur while driving a tile.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    /// The serial link failed or is closed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// A frame could not be built.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A command that must be answered got silence.
    #[error("no response from tile {address} on {port} to {command}")]
    NoResponse {
        port: String,
        address: TileAddress,
        command: &'static str,
    },

    /// The operation is deliberately not implemented.
    #[error("{0} is not supported")]
    NotSupported(&'static str),
}

impl TileError {
    /// True when the tile's whole channel should be considered down.
    pub fn is_transport(&self) -> bool {
        matches!(self, TileError::Channel(_))
    }
}

pub type Result<T> = std::result::Result<T, TileError>;
