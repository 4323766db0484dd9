//! Variable-field segment commands (0x80-0xBF).
//!
//! ```text
//!   1 0 R G B C C T
//!       │ │ │ └─┤ └── transition byte follows (unused)
//!       │ │ │   └──── update condition
//!       └─┴─┴──────── a segment field follows for this color
//! ```
//! Each present field is a 7-bit `-abcdefg` mask, optionally with the keep
//! flag (0x80) set. Colors without a field are cleared unless a present
//! field carries the keep flag.

use bytes::Bytes;

use crate::command::SEGMENT_CMD;
use crate::error::{FrameError, Result};

/// Field-presence bit for red.
pub const FIELD_RED: u8 = 0x20;
/// Field-presence bit for green.
pub const FIELD_GREEN: u8 = 0x10;
/// Field-presence bit for blue.
pub const FIELD_BLUE: u8 = 0x08;
/// Mask over the three field-presence bits.
pub const FIELD_MASK: u8 = 0x38;
/// Set on a field to keep colors that have no field.
pub const KEEP_MASK: u8 = 0x80;
/// Mask over the condition bits.
pub const CONDITION_MASK: u8 = 0x06;
/// Highest valid segment mask.
pub const MAX_SEGMENTS: u8 = 0x7F;

const FIELDS: [u8; 3] = [FIELD_RED, FIELD_GREEN, FIELD_BLUE];

/// When queued segment data reaches the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Condition {
    /// Applied as soon as the frame arrives.
    #[default]
    Immediate,
    /// Applied at the next LATCH.
    OnLatch,
    /// Applied when the sensor detects weight.
    OnTrigger,
    /// Applied at LATCH or sensor trigger, whichever comes first.
    OnLatchOrTrigger,
}

impl Condition {
    /// Build from the two trigger flags.
    pub fn from_flags(latch: bool, trigger: bool) -> Self {
        match (latch, trigger) {
            (false, false) => Condition::Immediate,
            (true, false) => Condition::OnLatch,
            (false, true) => Condition::OnTrigger,
            (true, true) => Condition::OnLatchOrTrigger,
        }
    }

    /// Condition bits inside the command byte.
    pub fn bits(self) -> u8 {
        match self {
            Condition::Immediate => 0x00,
            Condition::OnLatch => 0x02,
            Condition::OnTrigger => 0x04,
            Condition::OnLatchOrTrigger => 0x06,
        }
    }

    /// Decode the condition bits of a command byte.
    pub fn from_command(command: u8) -> Self {
        match command & CONDITION_MASK {
            0x00 => Condition::Immediate,
            0x02 => Condition::OnLatch,
            0x04 => Condition::OnTrigger,
            _ => Condition::OnLatchOrTrigger,
        }
    }
}

/// A segment command ready to be framed: command byte plus its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCommand {
    pub command: u8,
    pub fields: Bytes,
}

impl SegmentCommand {
    /// Whether the fields ask the tile to keep colors without a field.
    pub fn keeps_unstated(&self) -> bool {
        self.fields.iter().any(|f| f & KEEP_MASK != 0)
    }
}

/// Build a segment command from per-color masks.
///
/// `None` means "not stated". A color gets a field only when its mask is at
/// least 1. When any color is unstated, every field carries the keep flag so
/// the tile leaves the unstated colors alone; when all three are stated, colors
/// without a field (mask 0) are cleared.
pub fn segment_command(rgb: [Option<u8>; 3], condition: Condition) -> Result<SegmentCommand> {
    let keep = rgb.iter().any(Option::is_none);

    let mut command = SEGMENT_CMD | condition.bits();
    let mut fields = Vec::with_capacity(3);
    for (mask, field_bit) in rgb.into_iter().zip(FIELDS) {
        let Some(mask) = mask else { continue };
        if mask > MAX_SEGMENTS {
            return Err(FrameError::SegmentMaskOutOfRange { mask });
        }
        if mask < 1 {
            continue;
        }
        command |= field_bit;
        fields.push(if keep { mask | KEEP_MASK } else { mask });
    }

    Ok(SegmentCommand {
        command,
        fields: Bytes::from(fields),
    })
}
