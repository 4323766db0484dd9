use std::ops::{Deref, DerefMut};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use lightsweeper_frame::command::{self, command_name, MAX_ERRORS};
use lightsweeper_frame::{
    encode_checksummed, encode_frame, segment_command, Color, Condition, FrameError, Shape,
    TileAddress,
};
use lightsweeper_serial::SerialLink;
use tracing::{debug, info, trace, warn};

use crate::control::{TileControl, NO_CONTACT};
use crate::error::{Result, TileError};
use crate::state::{AdcStats, TileState, TileStatus};

/// How long a tile takes to reboot before its boot output can be read.
pub const RESET_SETTLE: Duration = Duration::from_secs(1);

/// Most bytes read back for a multi-byte answer.
const RESPONSE_LIMIT: usize = 8;

/// Proxy for one physical tile on a serial link.
///
/// All writes for a command go out as a single frame. Before a command that
/// expects an answer, stale input is drained so the answer isn't confused
/// with leftovers. If the link reports that an earlier frame was cut short,
/// the tiles on the port are resynchronized before the next frame.
#[derive(Debug)]
pub struct RealTile {
    link: SerialLink,
    port: String,
    address: TileAddress,
    state: TileState,
    debug: bool,
}

impl RealTile {
    pub fn new(link: SerialLink, address: TileAddress) -> Self {
        let port = link.name();
        Self {
            link,
            port,
            address,
            state: TileState::default(),
            debug: false,
        }
    }

    /// Proxy addressing every tile on the link.
    pub fn broadcast(link: SerialLink) -> Self {
        Self::new(link, TileAddress::BROADCAST)
    }

    pub fn link(&self) -> &SerialLink {
        &self.link
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Temporarily address the proxy elsewhere.
    ///
    /// The original address comes back when the guard drops, on every exit
    /// path including `?`.
    pub fn override_address(&mut self, address: TileAddress) -> AddressOverride<'_> {
        let saved = std::mem::replace(&mut self.address, address);
        AddressOverride { tile: self, saved }
    }

    fn write_command(&mut self, command: u8, args: &[u8], expect_response: bool) -> Result<()> {
        if self.link.take_desync() {
            warn!(port = %self.port, "link desynchronized, resyncing tiles");
            self.sync_comm()?;
        }
        if expect_response {
            self.link.drain()?;
        }

        let mut frame = BytesMut::new();
        encode_frame(self.address, command, args, &mut frame)?;
        trace!(port = %self.port, address = %self.address, bytes = ?frame.as_ref(), "tx");
        self.link.write(&frame)?;
        debug!(
            port = %self.port,
            address = %self.address,
            command = command_name(command),
            "sent"
        );

        if self.debug && !expect_response {
            let chatter = self.link.read(RESPONSE_LIMIT)?;
            if !chatter.is_empty() {
                info!(port = %self.port, address = %self.address, bytes = ?chatter, "tile debug output");
            }
        }
        Ok(())
    }

    fn query(&mut self, command: u8, args: &[u8], max: usize) -> Result<Vec<u8>> {
        self.write_command(command, args, true)?;
        let reply = self.link.read(max)?;
        trace!(port = %self.port, address = %self.address, bytes = ?reply, "rx");
        Ok(reply)
    }

    fn query_byte(&mut self, command: u8, args: &[u8]) -> Result<u8> {
        let reply = self.query(command, args, 1)?;
        reply.first().copied().ok_or_else(|| TileError::NoResponse {
            port: self.port.clone(),
            address: self.address,
            command: command_name(command),
        })
    }

    /// Hardware/firmware version bytes.
    ///
    /// Sent to the broadcast address, every tile on the port answers.
    pub fn version(&mut self) -> Result<Vec<u8>> {
        let reply = self.query(command::TILE_VERSION, &[], RESPONSE_LIMIT)?;
        if reply.is_empty() {
            return Err(TileError::NoResponse {
                port: self.port.clone(),
                address: self.address,
                command: "TILE_VERSION",
            });
        }
        Ok(reply)
    }

    /// Every byte that came back for an EEPROM read.
    ///
    /// More than one byte means more than one tile answered.
    pub fn eeprom_read_raw(&mut self, offset: u8) -> Result<Vec<u8>> {
        self.query(command::EEPROM_READ, &[offset], RESPONSE_LIMIT)
    }

    pub fn eeprom_read(&mut self, offset: u8) -> Result<u8> {
        let reply = self.eeprom_read_raw(offset)?;
        match reply.as_slice() {
            [] => Err(TileError::NoResponse {
                port: self.port.clone(),
                address: self.address,
                command: "EEPROM_READ",
            }),
            [value] => Ok(*value),
            [value, ..] => {
                warn!(
                    port = %self.port,
                    address = %self.address,
                    bytes = ?reply,
                    "several tiles answered one EEPROM read"
                );
                Ok(*value)
            }
        }
    }

    pub fn eeprom_write(&mut self, offset: u8, value: u8) -> Result<()> {
        let body = encode_checksummed(&[command::EEPROM_WRITE, command::EEPROM_WRITE2, offset, value]);
        self.write_command(body[0], &body[1..], false)
    }

    /// Store a new address in the tile's EEPROM and follow it.
    pub fn store_address(&mut self, address: TileAddress) -> Result<()> {
        self.eeprom_write(command::eeprom::ADDRESS, address.get())?;
        info!(port = %self.port, from = %self.address, to = %address, "stored new tile address");
        self.address = address;
        Ok(())
    }

    /// Ask the tile to pick a random address for itself.
    pub fn randomize_address(&mut self) -> Result<()> {
        let body = encode_checksummed(&[command::RANDOM_ADDRESS, command::RANDOM_ADDRESS2]);
        self.write_command(body[0], &body[1..], false)
    }

    /// Put the tile in one of the firmware display modes (0x00-0x0F).
    pub fn set_mode(&mut self, mode: u8) -> Result<()> {
        if !command::is_mode(mode) {
            return Err(FrameError::InvalidMode(mode).into());
        }
        self.write_command(mode, &[], false)
    }

    pub fn locate(&mut self) -> Result<()> {
        self.set_mode(command::SHOW_ADDRESS)
    }

    pub fn sensor_test(&mut self) -> Result<()> {
        self.set_mode(command::SENSOR_TEST)
    }

    pub fn segment_test(&mut self) -> Result<()> {
        self.set_mode(command::SEGMENT_TEST)
    }

    pub fn set_transition(&mut self, transition: u8) -> Result<()> {
        self.write_command(command::SET_TRANSITION, &[transition], false)
    }

    pub fn flip(&mut self) -> Result<()> {
        self.write_command(command::FLIP_ON, &[], false)
    }

    pub fn unflip(&mut self) -> Result<()> {
        self.write_command(command::FLIP_OFF, &[], false)
    }

    /// Turn tile debug output on or off.
    ///
    /// While on, anything the tile says after a command is read and logged.
    pub fn set_debug(&mut self, on: bool) -> Result<()> {
        self.write_command(command::DEBUG, &[u8::from(on)], false)?;
        self.debug = on;
        Ok(())
    }

    /// Queued command errors, newest first. Reading clears the queue.
    pub fn error_read(&mut self) -> Result<Vec<u8>> {
        self.query(command::RETURN_ERRORS, &[], MAX_ERRORS)
    }

    pub fn clear_errors(&mut self) -> Result<()> {
        self.write_command(command::CLEAR_ERRORS, &[], false)
    }

    pub fn status(&mut self) -> Result<TileStatus> {
        self.query_byte(command::TILE_STATUS, &[]).map(TileStatus)
    }

    pub fn adc_stats(&mut self) -> Result<AdcStats> {
        Ok(AdcStats {
            min: self.query_byte(command::ADC_MIN, &[])?,
            max: self.query_byte(command::ADC_MAX, &[])?,
            threshold: self.query_byte(command::ADC_THRESH, &[])?,
        })
    }

    /// Resynchronize every tile on the link.
    ///
    /// Two broadcast NOPs are enough to push any tile out of a half-received
    /// frame; whatever was in flight is then drained.
    pub fn sync_comm(&mut self) -> Result<()> {
        let mut frame = BytesMut::new();
        encode_frame(TileAddress::BROADCAST, command::NOP_MODE, &[], &mut frame)?;
        encode_frame(TileAddress::BROADCAST, command::NOP_MODE, &[], &mut frame)?;
        // Back to back in one write, no gap between the two NOPs.
        self.link.write(&frame)?;
        self.link.drain()?;
        debug!(port = %self.port, "resynchronized");
        Ok(())
    }

    /// Blank the tile with the firmware CLEAR command.
    pub fn clear(&mut self) -> Result<()> {
        self.write_command(command::CLEAR, &[], false)?;
        self.state.clear();
        Ok(())
    }
}

impl TileControl for RealTile {
    fn address(&self) -> TileAddress {
        self.address
    }

    fn assign_address(&mut self, address: TileAddress) {
        self.address = address;
    }

    fn channel_id(&self) -> &str {
        &self.port
    }

    fn color(&self) -> Option<Color> {
        self.state.color
    }

    fn shape(&self) -> Option<Shape> {
        self.state.shape
    }

    fn set_color(&mut self, color: Color) -> Result<()> {
        if self.state.color == Some(color) {
            return Ok(());
        }
        self.write_command(command::SET_COLOR, &[color.get()], false)?;
        self.state.color = Some(color);
        Ok(())
    }

    fn set_shape(&mut self, shape: Shape) -> Result<()> {
        if self.state.shape == Some(shape) {
            return Ok(());
        }
        self.write_command(command::SET_SHAPE, &[shape.get()], false)?;
        self.state.shape = Some(shape);
        Ok(())
    }

    fn set_segments(&mut self, rgb: [Option<u8>; 3], condition: Condition) -> Result<()> {
        let segments = segment_command(rgb, condition)?;
        self.write_command(segments.command, &segments.fields, false)?;
        // Color/shape are no longer a single known value.
        self.state.clear();
        Ok(())
    }

    fn latch(&mut self, whole_port: bool) -> Result<()> {
        if whole_port {
            let mut tile = self.override_address(TileAddress::BROADCAST);
            tile.write_command(command::LATCH, &[], false)
        } else {
            self.write_command(command::LATCH, &[], false)
        }
    }

    fn sensor_status(&mut self) -> Result<u16> {
        let reply = self.query(command::ADC_NOW, &[], 1)?;
        match reply.first() {
            Some(level) => Ok(u16::from(*level)),
            None => {
                debug!(port = %self.port, address = %self.address, "no sensor reading");
                Ok(NO_CONTACT)
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.write_command(command::RESET, &[], true)?;
        self.state.clear();
        thread::sleep(RESET_SETTLE);
        let boot = self.link.read(RESPONSE_LIMIT)?;
        info!(port = %self.port, address = %self.address, bytes = ?boot, "tile reset");
        Ok(())
    }
}

/// A [`RealTile`] pointed at another address until dropped.
pub struct AddressOverride<'a> {
    tile: &'a mut RealTile,
    saved: TileAddress,
}

impl Deref for AddressOverride<'_> {
    type Target = RealTile;

    fn deref(&self) -> &RealTile {
        self.tile
    }
}

impl DerefMut for AddressOverride<'_> {
    fn deref_mut(&mut self) -> &mut RealTile {
        self.tile
    }
}

impl Drop for AddressOverride<'_> {
    fn drop(&mut self) {
        self.tile.address = self.saved;
    }
}
