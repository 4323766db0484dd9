use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// Tile color: a 3-bit red/green/blue mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(u8);

impl Color {
    pub const BLACK: Color = Color(0);
    pub const RED: Color = Color(1);
    pub const GREEN: Color = Color(2);
    pub const YELLOW: Color = Color(3);
    pub const BLUE: Color = Color(4);
    pub const VIOLET: Color = Color(5);
    pub const CYAN: Color = Color(6);
    pub const WHITE: Color = Color(7);

    /// Order the rainbow self-test cycles through.
    pub const RAINBOW: [Color; 7] = [
        Color::RED,
        Color::YELLOW,
        Color::GREEN,
        Color::CYAN,
        Color::BLUE,
        Color::VIOLET,
        Color::WHITE,
    ];

    /// Wrap a raw color byte. The firmware ignores bits above the RGB mask.
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw byte sent with `SET_COLOR`.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Color for a name such as `red` or `violet`.
    pub fn from_name(name: &str) -> Option<Self> {
        let color = match name.to_ascii_lowercase().as_str() {
            "black" | "off" => Self::BLACK,
            "red" => Self::RED,
            "green" => Self::GREEN,
            "yellow" => Self::YELLOW,
            "blue" => Self::BLUE,
            "violet" | "magenta" => Self::VIOLET,
            "cyan" => Self::CYAN,
            "white" => Self::WHITE,
            _ => return None,
        };
        Some(color)
    }

    /// Name of one of the eight mask colors.
    pub fn name(self) -> &'static str {
        match self.0 & 0x07 {
            0 => "black",
            1 => "red",
            2 => "green",
            3 => "yellow",
            4 => "blue",
            5 => "violet",
            6 => "cyan",
            _ => "white",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Seven-segment shape: a 7-bit mask in `-abcdefg` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(u8);

impl Shape {
    /// Segment masks for the digits 0 through 9.
    const DIGITS: [u8; 10] = [0x7E, 0x30, 0x6D, 0x79, 0x33, 0x5B, 0x7D, 0x70, 0x7F, 0x7B];

    pub const BLANK: Shape = Shape(0x00);
    pub const ZERO: Shape = Shape(0x7E);
    pub const EIGHT: Shape = Shape(0x7F);
    pub const DASH: Shape = Shape(0x01);

    /// Wrap a raw segment mask.
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Shape of a decimal digit.
    pub fn digit(digit: u8) -> Result<Self> {
        Self::DIGITS
            .get(usize::from(digit))
            .map(|mask| Self(*mask))
            .ok_or(FrameError::InvalidDigit(digit))
    }

    /// Raw byte sent with `SET_SHAPE`.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}
