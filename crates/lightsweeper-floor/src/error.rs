use lightsweeper_frame::TileAddress;
use lightsweeper_serial::ChannelError;
use lightsweeper_tile::TileError;

/// Errors that can occur while discovering or driving a floor.
#[derive(Debug, thiserror::Error)]
pub enum FloorError {
    /// A tile operation failed.
    #[error(transparent)]
    Tile(#[from] TileError),

    /// A serial channel could not be opened or used.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// More than one tile answers at the same address.
    #[error("address conflict on {port}: more than one tile answers at {address}")]
    AddressConflict { port: String, address: TileAddress },

    /// The selection falls outside the grid.
    #[error("no tile at row {row}, column {col}")]
    OutOfBounds { row: usize, col: usize },

    /// The floor layout is inconsistent.
    #[error("invalid floor layout: {0}")]
    Layout(String),

    /// No open link with this name.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// Address 0 can't be a tile's own address.
    #[error("the broadcast address can't be assigned to a tile")]
    BroadcastAssignment,

    /// The layout file is not valid JSON.
    #[error("layout is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The layout file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FloorError {
    /// True when the failure means the tile's channel is down.
    pub fn is_transport(&self) -> bool {
        match self {
            FloorError::Channel(_) => true,
            FloorError::Tile(err) => err.is_transport(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FloorError>;
