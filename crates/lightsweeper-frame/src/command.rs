//! Command codes understood by the tile firmware.
//!
//! Codes below 0x10 select a display mode. 0x10-0x1F are one-byte control
//! commands, 0x20-0x23 set display state, 0x40-0x49 are queries answered
//! with one byte, 0x60/0x61 access EEPROM, 0x78-0x7A manage the error
//! queue, and 0x80-0xBF are segment commands (see [`crate::segment`]).

/// Changes nothing. Two in a row to the broadcast address resynchronize a port.
pub const NOP_MODE: u8 = 0x00;
/// Single digit ADC voltage; color changes at the threshold.
pub const SENSOR_TEST: u8 = 0x01;
/// Sensor statistics mode.
pub const SENSOR_STATS: u8 = 0x02;
/// Walk through every color of every segment.
pub const SEGMENT_TEST: u8 = 0x03;
/// Same walk, fast enough to look white.
pub const FASTEST_TEST: u8 = 0x04;
/// Fade in and out from the inside out.
pub const ROLLING_FADE_TEST: u8 = 0x05;
/// Second fade pattern.
pub const ROLLING_FADE_TEST2: u8 = 0x06;
/// Show the tile's serial address, for floor setup.
pub const SHOW_ADDRESS: u8 = 0x07;
/// Stop updating the display.
pub const STOP_MODE: u8 = 0x0F;

/// Apply queued segment data to the display. Usually sent to address 0.
pub const LATCH: u8 = 0x10;
/// Blank the tile.
pub const CLEAR: u8 = 0x11;
/// Reboot the tile.
pub const RESET: u8 = 0x12;
/// Reset ADC statistics.
pub const RESET_ADC: u8 = 0x13;
/// Reset ADC statistics and start calibrating.
pub const CALIBRATE_ON: u8 = 0x14;
/// Stop calibrating and store the ADC statistics in EEPROM.
pub const CALIBRATE_OFF: u8 = 0x15;
/// Turn tile debug output on or off (one argument).
pub const DEBUG: u8 = 0x17;
/// Show the display upside down until reset.
pub const FLIP_ON: u8 = 0x18;
/// Show the display right side up.
pub const FLIP_OFF: u8 = 0x19;
/// First byte of the checksummed random-address command.
pub const RANDOM_ADDRESS: u8 = 0x1F;
/// Second byte of the checksummed random-address command.
pub const RANDOM_ADDRESS2: u8 = 0xD4;

/// Set the tile color (one argument).
pub const SET_COLOR: u8 = 0x20;
/// Set which segments are lit, `-abcdefg` (one argument).
pub const SET_SHAPE: u8 = 0x21;
/// Set the transition used at the next refresh (one argument).
pub const SET_TRANSITION: u8 = 0x22;
/// Set color, segments and transition together (three arguments).
pub const SET_TILE: u8 = 0x23;

/// Current ADC reading, unsigned 8 bits.
pub const ADC_NOW: u8 = 0x40;
/// Minimum ADC reading seen.
pub const ADC_MIN: u8 = 0x41;
/// Maximum ADC reading seen.
pub const ADC_MAX: u8 = 0x42;
/// Sensor threshold.
pub const ADC_THRESH: u8 = 0x43;
/// Sensor tripped, with history.
pub const SENSOR_NOW: u8 = 0x44;
/// Bit-mapped tile status.
pub const TILE_STATUS: u8 = 0x48;
/// Hardware/firmware version.
pub const TILE_VERSION: u8 = 0x49;

/// Status bit: segments flipped.
pub const STATUS_FLIP_MASK: u8 = 0x80;
/// Status bit: the error queue is not empty.
pub const STATUS_ERR_MASK: u8 = 0x40;
/// Status bit: calibration running.
pub const STATUS_CAL_MASK: u8 = 0x20;

/// EEPROM read: command plus one offset byte.
pub const EEPROM_READ: u8 = 0x60;
/// EEPROM write: two command bytes, offset, datum, checksum.
pub const EEPROM_WRITE: u8 = 0x61;
/// Second byte of the checksummed EEPROM write.
pub const EEPROM_WRITE2: u8 = 0x53;

/// Number of command errors the tile remembers.
pub const MAX_ERRORS: usize = 4;
/// Error test command.
pub const ERROR_CMD: u8 = 0x78;
/// Return the queued errors, newest first, and clear the queue.
pub const RETURN_ERRORS: u8 = 0x79;
/// Clear the error queue.
pub const CLEAR_ERRORS: u8 = 0x7A;

/// First segment command code.
pub const SEGMENT_CMD: u8 = 0x80;
/// Last segment command code.
pub const SEGMENT_CMD_END: u8 = 0xBF;

/// EEPROM byte map.
pub mod eeprom {
    /// Tile address, in the top five bits.
    pub const ADDRESS: u8 = 0;
    /// Configuration flags; 0x80 means installed upside down.
    pub const CONFIG: u8 = 1;
    /// Hardware version: 0 dev board, 1 prototype, 2 production.
    pub const HARDWARE: u8 = 2;
    /// High ADC value from calibration.
    pub const ADC_MAX: u8 = 3;
    /// Low ADC value from calibration.
    pub const ADC_MIN: u8 = 4;
    /// Power-up mode, a mode command from 0 to 0x0F.
    pub const POWER_UP_MODE: u8 = 5;
}

/// Human-readable name for a command byte, for logs and diagnostics.
pub fn command_name(command: u8) -> &'static str {
    match command {
        NOP_MODE => "NOP_MODE",
        SENSOR_TEST => "SENSOR_TEST",
        SENSOR_STATS => "SENSOR_STATS",
        SEGMENT_TEST => "SEGMENT_TEST",
        FASTEST_TEST => "FASTEST_TEST",
        ROLLING_FADE_TEST => "ROLLING_FADE_TEST",
        ROLLING_FADE_TEST2 => "ROLLING_FADE_TEST2",
        SHOW_ADDRESS => "SHOW_ADDRESS",
        STOP_MODE => "STOP_MODE",
        LATCH => "LATCH",
        CLEAR => "CLEAR",
        RESET => "RESET",
        RESET_ADC => "RESET_ADC",
        CALIBRATE_ON => "CALIBRATE_ON",
        CALIBRATE_OFF => "CALIBRATE_OFF",
        DEBUG => "DEBUG",
        FLIP_ON => "FLIP_ON",
        FLIP_OFF => "FLIP_OFF",
        RANDOM_ADDRESS => "RANDOM_ADDRESS",
        SET_COLOR => "SET_COLOR",
        SET_SHAPE => "SET_SHAPE",
        SET_TRANSITION => "SET_TRANSITION",
        SET_TILE => "SET_TILE",
        ADC_NOW => "ADC_NOW",
        ADC_MIN => "ADC_MIN",
        ADC_MAX => "ADC_MAX",
        ADC_THRESH => "ADC_THRESH",
        SENSOR_NOW => "SENSOR_NOW",
        TILE_STATUS => "TILE_STATUS",
        TILE_VERSION => "TILE_VERSION",
        EEPROM_READ => "EEPROM_READ",
        EEPROM_WRITE => "EEPROM_WRITE",
        ERROR_CMD => "ERROR_CMD",
        RETURN_ERRORS => "RETURN_ERRORS",
        CLEAR_ERRORS => "CLEAR_ERRORS",
        SEGMENT_CMD..=SEGMENT_CMD_END => "SEGMENT",
        _ => "UNKNOWN",
    }
}

/// Returns true for the test/diagnostic display modes.
pub fn is_mode(command: u8) -> bool {
    command <= STOP_MODE
}

/// Returns true for segment commands.
pub fn is_segment(command: u8) -> bool {
    (SEGMENT_CMD..=SEGMENT_CMD_END).contains(&command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_known_codes() {
        assert_eq!(command_name(LATCH), "LATCH");
        assert_eq!(command_name(0xBC), "SEGMENT");
        assert_eq!(command_name(0x5F), "UNKNOWN");
    }

    #[test]
    fn code_ranges() {
        assert!(is_mode(SHOW_ADDRESS));
        assert!(!is_mode(LATCH));
        assert!(is_segment(0x80));
        assert!(is_segment(0xBF));
        assert!(!is_segment(0xC0));
    }
}
