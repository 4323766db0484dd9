/// Errors that can occur while building or parsing tile frames.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// More argument bytes than the address byte can announce.
    #[error("too many arguments ({count}, max {max})")]
    TooManyArgs { count: usize, max: usize },

    /// Tile addresses are 0 or a multiple of 8 up to 248.
    #[error("invalid tile address {0} (expected 0 or a multiple of 8 up to 248)")]
    InvalidAddress(u16),

    /// Segment masks only have seven bits.
    #[error("segment mask {mask:#04x} out of range (max 0x7f)")]
    SegmentMaskOutOfRange { mask: u8 },

    /// The checksummed bytes do not sum to zero modulo 256.
    #[error("checksum mismatch (byte sum {sum:#04x}, expected 0x00)")]
    ChecksumMismatch { sum: u8 },

    /// Display modes are commands 0x00 through 0x0F.
    #[error("invalid display mode {0:#04x} (max 0x0f)")]
    InvalidMode(u8),

    /// Only the digits 0 through 9 have a seven-segment shape.
    #[error("no seven-segment shape for digit {0}")]
    InvalidDigit(u8),
}

pub type Result<T> = std::result::Result<T, FrameError>;
