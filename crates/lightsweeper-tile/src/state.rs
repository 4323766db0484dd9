use lightsweeper_frame::command::{STATUS_CAL_MASK, STATUS_ERR_MASK, STATUS_FLIP_MASK};
use lightsweeper_frame::{Color, Shape};

/// What a proxy believes the tile is showing.
///
/// Only updated after a successful write, so a failed write is retried the
/// next time a different value comes along.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileState {
    pub color: Option<Color>,
    pub shape: Option<Shape>,
}

impl TileState {
    /// Forget everything, e.g. after a reset.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Decoded `TILE_STATUS` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileStatus(pub u8);

impl TileStatus {
    pub fn is_flipped(self) -> bool {
        self.0 & STATUS_FLIP_MASK != 0
    }

    /// The error queue holds something; read it with `error_read`.
    pub fn has_errors(self) -> bool {
        self.0 & STATUS_ERR_MASK != 0
    }

    pub fn is_calibrating(self) -> bool {
        self.0 & STATUS_CAL_MASK != 0
    }
}

/// ADC statistics kept by the tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcStats {
    pub min: u8,
    pub max: u8,
    pub threshold: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits() {
        let status = TileStatus(0xA0);
        assert!(status.is_flipped());
        assert!(!status.has_errors());
        assert!(status.is_calibrating());
    }
}
