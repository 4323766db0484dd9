use std::time::Duration;

use lightsweeper_serial::MIN_WRITE_GAP;

/// Floor-wide timing and sensor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorConfig {
    /// Readings strictly below this count as a step.
    pub sensor_threshold: u16,
    /// Pause between tiles in the display loops.
    pub tile_write_delay: Duration,
    /// Hold time of each color in rainbow mode.
    pub rainbow_interval: Duration,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            sensor_threshold: 100,
            tile_write_delay: MIN_WRITE_GAP,
            rainbow_interval: Duration::from_millis(400),
        }
    }
}
