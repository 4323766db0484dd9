use std::fmt;
use std::io;

use lightsweeper_floor::FloorError;
use lightsweeper_frame::FrameError;
use lightsweeper_serial::ChannelError;
use lightsweeper_tile::TileError;

// Exit codes. Partial success on a floor (some channels dead) is TRANSPORT_ERROR.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const NO_RESPONSE: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(err.kind()), format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    let code = match err.io_kind() {
        Some(io::ErrorKind::PermissionDenied) => PERMISSION_DENIED,
        Some(io::ErrorKind::TimedOut) => TIMEOUT,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    // Every frame error comes from a bad value the user typed.
    CliError::new(USAGE, format!("{context}: {err}"))
}

pub fn tile_error(context: &str, err: TileError) -> CliError {
    match err {
        TileError::Channel(err) => channel_error(context, err),
        TileError::Frame(err) => frame_error(context, err),
        TileError::NoResponse { .. } => CliError::new(NO_RESPONSE, format!("{context}: {err}")),
        TileError::NotSupported(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn floor_error(context: &str, err: FloorError) -> CliError {
    match err {
        FloorError::Tile(err) => tile_error(context, err),
        FloorError::Channel(err) => channel_error(context, err),
        FloorError::Io(err) => io_error(context, err),
        FloorError::Layout(_) | FloorError::Json(_) | FloorError::BroadcastAssignment => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FloorError::UnknownChannel(_) | FloorError::AddressConflict { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FloorError::OutOfBounds { .. } => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightsweeper_frame::TileAddress;

    #[test]
    fn closed_link_is_transport_error() {
        let err = tile_error(
            "set color",
            TileError::Channel(ChannelError::Closed {
                port: "COM3".into(),
            }),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("set color: "));
    }

    #[test]
    fn silence_has_its_own_code() {
        let err = tile_error(
            "version",
            TileError::NoResponse {
                port: "COM3".into(),
                address: TileAddress::FIRST,
                command: "TILE_VERSION",
            },
        );
        assert_eq!(err.code, NO_RESPONSE);
    }

    #[test]
    fn layout_problems_are_data_invalid() {
        let err = floor_error("layout", FloorError::Layout("bad".into()));
        assert_eq!(err.code, DATA_INVALID);
        let err = floor_error(
            "layout",
            FloorError::Io(io::Error::from(io::ErrorKind::NotFound)),
        );
        assert_eq!(err.code, FAILURE);
    }
}
