/// Errors that can occur on a serial channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The port could not be opened.
    #[error("serial port {port} unavailable: {source}")]
    Unavailable {
        port: String,
        source: serialport::Error,
    },

    /// The link has been torn down.
    #[error("serial port {port} is closed")]
    Closed { port: String },

    /// An I/O error occurred while talking to the port.
    #[error("serial I/O error on {port}: {source}")]
    Io {
        port: String,
        source: std::io::Error,
    },

    /// The operating system refused to list serial ports.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(serialport::Error),
}

impl ChannelError {
    /// Name of the port the error belongs to, if any.
    pub fn port(&self) -> Option<&str> {
        match self {
            ChannelError::Unavailable { port, .. }
            | ChannelError::Closed { port }
            | ChannelError::Io { port, .. } => Some(port),
            ChannelError::Enumerate(_) => None,
        }
    }

    /// The underlying I/O error kind, when there is one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            ChannelError::Unavailable { source, .. } | ChannelError::Enumerate(source) => {
                match source.kind() {
                    serialport::ErrorKind::Io(kind) => Some(kind),
                    serialport::ErrorKind::NoDevice => Some(std::io::ErrorKind::NotFound),
                    _ => None,
                }
            }
            ChannelError::Io { source, .. } => Some(source.kind()),
            ChannelError::Closed { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
