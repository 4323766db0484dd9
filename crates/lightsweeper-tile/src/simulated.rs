use std::collections::VecDeque;

use lightsweeper_frame::segment::KEEP_MASK;
use lightsweeper_frame::{segment_command, Color, Condition, Shape, TileAddress};
use lightsweeper_serial::ChannelError;
use tracing::trace;

use crate::control::TileControl;
use crate::error::Result;
use crate::state::TileState;

/// In-memory tile with the same caching rules as [`RealTile`](crate::RealTile).
///
/// Counts the writes that would have reached the wire, serves scripted
/// sensor readings, and can be taken offline to stand in for a dead port.
#[derive(Debug, Clone)]
pub struct SimulatedTile {
    channel: String,
    address: TileAddress,
    state: TileState,
    segments: [u8; 3],
    queued: Option<([Option<u8>; 3], bool, Condition)>,
    reading: u16,
    script: VecDeque<u16>,
    writes: usize,
    offline: bool,
}

impl SimulatedTile {
    /// Idle sensor level: nobody standing on the tile.
    pub const IDLE_READING: u16 = 200;

    pub fn new(channel: impl Into<String>, address: TileAddress) -> Self {
        Self {
            channel: channel.into(),
            address,
            state: TileState::default(),
            segments: [0; 3],
            queued: None,
            reading: Self::IDLE_READING,
            script: VecDeque::new(),
            writes: 0,
            offline: false,
        }
    }

    /// Reading returned once the script runs out.
    pub fn set_reading(&mut self, level: u16) {
        self.reading = level;
    }

    /// Readings returned by the next polls, in order.
    pub fn push_readings(&mut self, levels: impl IntoIterator<Item = u16>) {
        self.script.extend(levels);
    }

    /// Writes that reached the (simulated) wire.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Per-color segment masks currently displayed.
    pub fn segments(&self) -> [u8; 3] {
        self.segments
    }

    /// Make every operation fail as if the port were unplugged.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn wire(&mut self) -> Result<()> {
        if self.offline {
            return Err(ChannelError::Closed {
                port: self.channel.clone(),
            }
            .into());
        }
        self.writes += 1;
        Ok(())
    }

    fn apply(&mut self, fields: [Option<u8>; 3], keep: bool) {
        for (current, field) in self.segments.iter_mut().zip(fields) {
            match field {
                Some(mask) => *current = mask,
                None if keep => {}
                None => *current = 0,
            }
        }
    }
}

impl TileControl for SimulatedTile {
    fn address(&self) -> TileAddress {
        self.address
    }

    fn assign_address(&mut self, address: TileAddress) {
        self.address = address;
    }

    fn channel_id(&self) -> &str {
        &self.channel
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
        self.wire()?;
        self.state.color = Some(color);
        Ok(())
    }

    fn set_shape(&mut self, shape: Shape) -> Result<()> {
        if self.state.shape == Some(shape) {
            return Ok(());
        }
        self.wire()?;
        self.state.shape = Some(shape);
        Ok(())
    }

    fn set_segments(&mut self, rgb: [Option<u8>; 3], condition: Condition) -> Result<()> {
        // Same encoding as the wire, so both tiles agree on what is kept.
        let command = segment_command(rgb, condition)?;
        self.wire()?;
        self.state.clear();

        let keep = command.keeps_unstated();
        let mut fields = [None; 3];
        let mut sent = command.fields.iter();
        for (slot, requested) in fields.iter_mut().zip(rgb) {
            if matches!(requested, Some(mask) if mask >= 1) {
                *slot = sent.next().map(|raw| raw & !KEEP_MASK);
            }
        }
        trace!(address = %self.address, ?fields, keep, ?condition, "simulated segments");

        if condition == Condition::Immediate {
            self.apply(fields, keep);
        } else {
            self.queued = Some((fields, keep, condition));
        }
        Ok(())
    }

    fn latch(&mut self, _whole_port: bool) -> Result<()> {
        self.wire()?;
        if let Some((fields, keep, condition)) = self.queued {
            if condition != Condition::OnTrigger {
                self.queued = None;
                self.apply(fields, keep);
            }
        }
        Ok(())
    }

    fn sensor_status(&mut self) -> Result<u16> {
        self.wire()?;
        Ok(self.script.pop_front().unwrap_or(self.reading))
    }

    fn reset(&mut self) -> Result<()> {
        self.wire()?;
        self.state.clear();
        self.segments = [0; 3];
        self.queued = None;
        Ok(())
    }
}
