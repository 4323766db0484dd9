use lightsweeper_frame::{Color, Condition, Shape, TileAddress};

use crate::error::{Result, TileError};

/// Sensor value reported when a tile does not answer in time.
///
/// Outside the 8-bit ADC range on purpose: silence must never look like a
/// zero (full pressure) reading.
pub const NO_CONTACT: u16 = 256;

/// What the floor and game layers may ask of a tile.
///
/// Implemented by [`RealTile`](crate::RealTile) for hardware and
/// [`SimulatedTile`](crate::SimulatedTile) for in-memory floors.
pub trait TileControl {
    /// Current address of the proxy.
    fn address(&self) -> TileAddress;

    /// Point the proxy at another address. Nothing is sent to the tile.
    fn assign_address(&mut self, address: TileAddress);

    /// Identifier of the channel the tile hangs off.
    fn channel_id(&self) -> &str;

    /// Last color written, if any.
    fn color(&self) -> Option<Color>;

    /// Last shape written, if any.
    fn shape(&self) -> Option<Shape>;

    /// Set the tile color. Does nothing if the color is already set.
    fn set_color(&mut self, color: Color) -> Result<()>;

    /// Set the lit segments. Does nothing if the shape is already set.
    fn set_shape(&mut self, shape: Shape) -> Result<()>;

    /// Queue per-color segment masks, applied under `condition`.
    fn set_segments(&mut self, rgb: [Option<u8>; 3], condition: Condition) -> Result<()>;

    /// Apply queued segment data. `whole_port` latches every tile on the channel.
    fn latch(&mut self, whole_port: bool) -> Result<()>;

    /// Current sensor reading; [`NO_CONTACT`] when the tile stays silent.
    fn sensor_status(&mut self) -> Result<u16>;

    /// Reboot the tile.
    fn reset(&mut self) -> Result<()>;

    /// Turn the display off.
    fn blank(&mut self) -> Result<()> {
        self.set_color(Color::BLACK)
    }

    /// Show a decimal digit.
    fn set_digit(&mut self, digit: u8) -> Result<()> {
        let shape = Shape::digit(digit)?;
        self.set_shape(shape)
    }

    /// Set color and shape together.
    fn set(&mut self, shape: Shape, color: Color) -> Result<()> {
        self.set_color(color)?;
        self.set_shape(shape)
    }

    fn set_animation(&mut self) -> Result<()> {
        Err(TileError::NotSupported("set_animation"))
    }

    fn calibrate(&mut self) -> Result<()> {
        Err(TileError::NotSupported("calibrate"))
    }

    fn unregister(&mut self) -> Result<()> {
        Err(TileError::NotSupported("unregister"))
    }
}
