//! Tile firmware simulated behind a [`Channel`].
//!
//! [`SimulatedBus`] decodes every frame written to it and answers the way
//! tiles on a real port would: one byte per answering tile, silence for an
//! absent address, checksummed commands ignored when the checksum is wrong.
//! Several tiles may share an address, which is how address conflicts look
//! on real hardware.
//!
//! The [`BusHandle`] returned next to the bus stays with the test so it can
//! place tiles, script sensor values and inspect the frames that went out.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use bytes::BytesMut;
use lightsweeper_frame::command::{self, eeprom, MAX_ERRORS};
use lightsweeper_frame::segment::{FIELD_BLUE, FIELD_GREEN, FIELD_RED, KEEP_MASK};
use lightsweeper_frame::{decode_frame, verify_checksum, Condition, Frame, TileAddress};
use lightsweeper_serial::Channel;
use tracing::{debug, trace};

/// Version byte every simulated tile reports.
pub const FIRMWARE_VERSION: u8 = 0x12;

/// One simulated tile's firmware state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualTile {
    pub eeprom: [u8; 8],
    pub color: u8,
    pub shape: u8,
    /// Per-color segment masks, red/green/blue.
    pub segments: [u8; 3],
    pub sensor: u8,
    pub adc_min: u8,
    pub adc_max: u8,
    pub threshold: u8,
    pub mode: u8,
    pub flipped: bool,
    pub debug: bool,
    /// Command errors, newest first.
    pub errors: VecDeque<u8>,
    queued: Option<([Option<u8>; 3], bool, Condition)>,
}

impl VirtualTile {
    pub fn new(address: u8) -> Self {
        let mut eeprom = [0u8; 8];
        eeprom[usize::from(eeprom::ADDRESS)] = address;
        eeprom[usize::from(eeprom::HARDWARE)] = 2;
        Self {
            eeprom,
            color: 0,
            shape: 0,
            segments: [0; 3],
            sensor: 200,
            adc_min: 20,
            adc_max: 230,
            threshold: 100,
            mode: command::NOP_MODE,
            flipped: false,
            debug: false,
            errors: VecDeque::new(),
            queued: None,
        }
    }

    /// Address the tile currently answers to.
    pub fn address(&self) -> u8 {
        self.eeprom[usize::from(eeprom::ADDRESS)] & 0xF8
    }

    fn status(&self) -> u8 {
        let mut status = 0;
        if self.flipped {
            status |= command::STATUS_FLIP_MASK;
        }
        if !self.errors.is_empty() {
            status |= command::STATUS_ERR_MASK;
        }
        status
    }

    fn push_error(&mut self, code: u8) {
        self.errors.push_front(code);
        self.errors.truncate(MAX_ERRORS);
    }

    fn apply_segments(&mut self, fields: [Option<u8>; 3], keep: bool) {
        for (current, field) in self.segments.iter_mut().zip(fields) {
            match field {
                Some(mask) => *current = mask,
                None if keep => {}
                None => *current = 0,
            }
        }
    }

    fn latch(&mut self, trigger: bool) {
        let Some((fields, keep, condition)) = self.queued else {
            return;
        };
        let fires = match condition {
            Condition::Immediate => true,
            Condition::OnLatch => !trigger,
            Condition::OnTrigger => trigger,
            Condition::OnLatchOrTrigger => true,
        };
        if fires {
            self.queued = None;
            self.apply_segments(fields, keep);
        }
    }

    fn reboot(&mut self) {
        self.color = 0;
        self.shape = 0;
        self.segments = [0; 3];
        self.queued = None;
        self.flipped = false;
        self.debug = false;
        self.mode = self.eeprom[usize::from(eeprom::POWER_UP_MODE)] & 0x0F;
    }
}

#[derive(Debug, Default)]
struct BusState {
    tiles: Vec<VirtualTile>,
    pending: BytesMut,
    outbox: VecDeque<u8>,
    frames: Vec<Frame>,
    rejected_checksums: usize,
    fail_after: Option<usize>,
    fail_armed: bool,
}

impl BusState {
    fn targets(&self, address: TileAddress) -> Vec<usize> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| address.is_broadcast() || tile.address() == address.get())
            .map(|(i, _)| i)
            .collect()
    }

    fn lowest_free_address(&self) -> Option<u8> {
        TileAddress::all_tiles()
            .map(TileAddress::get)
            .find(|a| self.tiles.iter().all(|t| t.address() != *a))
    }

    fn dispatch(&mut self, frame: &Frame) {
        let targets = self.targets(frame.address);
        trace!(
            address = %frame.address,
            command = command::command_name(frame.command),
            tiles = targets.len(),
            "bus frame"
        );

        for index in targets {
            self.execute(index, frame);
        }
        self.frames.push(frame.clone());
    }

    fn execute(&mut self, index: usize, frame: &Frame) {
        let args = frame.args.as_ref();
        let arg = |i: usize| args.get(i).copied().unwrap_or(0);

        match frame.command {
            command::TILE_VERSION => self.outbox.push_back(FIRMWARE_VERSION),
            command::TILE_STATUS => {
                let status = self.tiles[index].status();
                self.outbox.push_back(status);
            }
            command::ADC_NOW => {
                let level = self.tiles[index].sensor;
                self.outbox.push_back(level);
            }
            command::ADC_MIN => {
                let value = self.tiles[index].adc_min;
                self.outbox.push_back(value);
            }
            command::ADC_MAX => {
                let value = self.tiles[index].adc_max;
                self.outbox.push_back(value);
            }
            command::ADC_THRESH => {
                let value = self.tiles[index].threshold;
                self.outbox.push_back(value);
            }
            command::EEPROM_READ => {
                let value = self.tiles[index]
                    .eeprom
                    .get(usize::from(arg(0)))
                    .copied()
                    .unwrap_or(0xFF);
                self.outbox.push_back(value);
            }
            command::RETURN_ERRORS => {
                let errors: Vec<u8> = self.tiles[index].errors.drain(..).collect();
                self.outbox.extend(errors);
            }
            command::CLEAR_ERRORS => self.tiles[index].errors.clear(),
            command::EEPROM_WRITE => {
                let mut body = vec![frame.command];
                body.extend_from_slice(args);
                if args.len() != 4
                    || arg(0) != command::EEPROM_WRITE2
                    || verify_checksum(&body).is_err()
                {
                    self.rejected_checksums += 1;
                    self.tiles[index].push_error(frame.command);
                    return;
                }
                if let Some(cell) = self.tiles[index].eeprom.get_mut(usize::from(arg(1))) {
                    *cell = arg(2);
                }
            }
            command::RANDOM_ADDRESS => {
                let mut body = vec![frame.command];
                body.extend_from_slice(args);
                if args.len() != 2
                    || arg(0) != command::RANDOM_ADDRESS2
                    || verify_checksum(&body).is_err()
                {
                    self.rejected_checksums += 1;
                    self.tiles[index].push_error(frame.command);
                    return;
                }
                if let Some(address) = self.lowest_free_address() {
                    debug!(from = self.tiles[index].address(), to = address, "tile took new address");
                    self.tiles[index].eeprom[usize::from(eeprom::ADDRESS)] = address;
                }
            }
            command::SET_COLOR => self.tiles[index].color = arg(0),
            command::SET_SHAPE => self.tiles[index].shape = arg(0),
            command::SET_TRANSITION => {}
            command::SET_TILE => {
                self.tiles[index].color = arg(0);
                self.tiles[index].shape = arg(1);
            }
            command::LATCH => self.tiles[index].latch(false),
            command::CLEAR => {
                let tile = &mut self.tiles[index];
                tile.shape = 0;
                tile.segments = [0; 3];
            }
            command::RESET => self.tiles[index].reboot(),
            command::RESET_ADC | command::CALIBRATE_ON | command::CALIBRATE_OFF => {}
            command::DEBUG => self.tiles[index].debug = arg(0) != 0,
            command::FLIP_ON => self.tiles[index].flipped = true,
            command::FLIP_OFF => self.tiles[index].flipped = false,
            code if command::is_mode(code) => self.tiles[index].mode = code,
            code if command::is_segment(code) => {
                let mut fields = [None; 3];
                let mut keep = false;
                let mut next = args.iter();
                for (slot, bit) in fields.iter_mut().zip([FIELD_RED, FIELD_GREEN, FIELD_BLUE]) {
                    if code & bit != 0 {
                        let raw = next.next().copied().unwrap_or(0);
                        keep |= raw & KEEP_MASK != 0;
                        *slot = Some(raw & !KEEP_MASK);
                    }
                }
                let condition = Condition::from_command(code);
                let tile = &mut self.tiles[index];
                if condition == Condition::Immediate {
                    tile.apply_segments(fields, keep);
                } else {
                    tile.queued = Some((fields, keep, condition));
                }
            }
            code => self.tiles[index].push_error(code),
        }
    }

    fn receive(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        loop {
            match decode_frame(&mut self.pending) {
                Ok(Some(frame)) => self.dispatch(&frame),
                Ok(None) => break,
                Err(err) => {
                    // Tiles throw away what they can't frame; the host resyncs.
                    debug!(error = %err, "bus dropped undecodable input");
                    self.pending.clear();
                    break;
                }
            }
        }
    }
}

/// A serial port with simulated tiles on it.
#[derive(Debug)]
pub struct SimulatedBus {
    name: String,
    shared: Rc<RefCell<BusState>>,
}

impl SimulatedBus {
    /// Create an empty bus and the handle used to inspect it.
    pub fn new(name: impl Into<String>) -> (Self, BusHandle) {
        let shared = Rc::new(RefCell::new(BusState::default()));
        let handle = BusHandle {
            shared: Rc::clone(&shared),
        };
        (
            Self {
                name: name.into(),
                shared,
            },
            handle,
        )
    }
}

impl Channel for SimulatedBus {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.borrow_mut();
        if state.fail_armed {
            state.fail_armed = false;
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        let accepted = match state.fail_after.take() {
            Some(limit) if limit < bytes.len() => {
                state.fail_armed = true;
                limit
            }
            _ => bytes.len(),
        };
        state.receive(&bytes[..accepted]);
        Ok(accepted)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.shared.borrow_mut();
        let n = buf.len().min(state.outbox.len());
        for (slot, byte) in buf.iter_mut().zip(state.outbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn available(&mut self) -> io::Result<Option<usize>> {
        Ok(Some(self.shared.borrow().outbox.len()))
    }
}

/// Test-side view of a [`SimulatedBus`].
#[derive(Debug, Clone)]
pub struct BusHandle {
    shared: Rc<RefCell<BusState>>,
}

impl BusHandle {
    /// Plug in a factory-fresh tile at `address`.
    pub fn add_tile(&self, address: u8) {
        self.shared.borrow_mut().tiles.push(VirtualTile::new(address));
    }

    /// First tile answering at `address`.
    pub fn tile(&self, address: u8) -> Option<VirtualTile> {
        self.shared
            .borrow()
            .tiles
            .iter()
            .find(|t| t.address() == address)
            .cloned()
    }

    /// Addresses of every tile on the bus, in plug-in order.
    pub fn addresses(&self) -> Vec<u8> {
        self.shared.borrow().tiles.iter().map(VirtualTile::address).collect()
    }

    pub fn set_sensor(&self, address: u8, level: u8) {
        for tile in self
            .shared
            .borrow_mut()
            .tiles
            .iter_mut()
            .filter(|t| t.address() == address)
        {
            tile.sensor = level;
        }
    }

    /// Simulate weight on a tile: fire anything queued on trigger.
    pub fn step_on(&self, address: u8) {
        let mut state = self.shared.borrow_mut();
        for tile in state.tiles.iter_mut().filter(|t| t.address() == address) {
            tile.sensor = 0;
            tile.latch(true);
        }
    }

    /// Every frame the bus decoded so far.
    pub fn frames(&self) -> Vec<Frame> {
        self.shared.borrow().frames.clone()
    }

    pub fn frames_with(&self, command: u8) -> Vec<Frame> {
        self.shared
            .borrow()
            .frames
            .iter()
            .filter(|f| f.command == command)
            .cloned()
            .collect()
    }

    pub fn clear_frames(&self) {
        self.shared.borrow_mut().frames.clear();
    }

    /// Checksummed commands the tiles refused.
    pub fn rejected_checksums(&self) -> usize {
        self.shared.borrow().rejected_checksums
    }

    /// Queue bytes nobody asked for, as a chatty tile would.
    pub fn inject_noise(&self, bytes: &[u8]) {
        self.shared.borrow_mut().outbox.extend(bytes.iter().copied());
    }

    /// Accept only `bytes` of the next write, then fail the write after it.
    pub fn fail_next_write_after(&self, bytes: usize) {
        self.shared.borrow_mut().fail_after = Some(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightsweeper_frame::{encode_checksummed, Frame};

    fn send(bus: &mut SimulatedBus, address: u16, command: u8, args: &[u8]) {
        let frame = Frame::new(TileAddress::new(address).unwrap(), command, args.to_vec());
        bus.write(&frame.to_bytes().unwrap()).unwrap();
    }

    fn drain(bus: &mut SimulatedBus) -> Vec<u8> {
        let mut buf = [0u8; 16];
        let n = bus.read(&mut buf).unwrap();
        buf[..n].to_vec()
    }

    #[test]
    fn broadcast_version_answers_per_tile() {
        let (mut bus, handle) = SimulatedBus::new("sim");
        handle.add_tile(8);
        handle.add_tile(40);
        send(&mut bus, 0, command::TILE_VERSION, &[]);
        assert_eq!(drain(&mut bus), vec![FIRMWARE_VERSION; 2]);
    }

    #[test]
    fn bad_checksum_is_refused() {
        let (mut bus, handle) = SimulatedBus::new("sim");
        handle.add_tile(8);
        let mut body = encode_checksummed(&[command::EEPROM_WRITE, command::EEPROM_WRITE2, 0, 16]).to_vec();
        body[4] ^= 1;
        send(&mut bus, 8, body[0], &body[1..]);
        assert_eq!(handle.rejected_checksums(), 1);
        assert_eq!(handle.addresses(), vec![8]);
    }

    #[test]
    fn random_address_picks_free_slots() {
        let (mut bus, handle) = SimulatedBus::new("sim");
        handle.add_tile(8);
        handle.add_tile(8);
        let body = encode_checksummed(&[command::RANDOM_ADDRESS, command::RANDOM_ADDRESS2]);
        send(&mut bus, 0, body[0], &body[1..]);
        let mut addresses = handle.addresses();
        addresses.sort_unstable();
        assert_eq!(addresses, vec![16, 24]);
    }

    #[test]
    fn keep_flag_leaves_other_colors() {
        let (mut bus, handle) = SimulatedBus::new("sim");
        handle.add_tile(8);
        send(&mut bus, 8, 0xB8, &[0x01, 0x02, 0x03]);
        send(&mut bus, 8, 0xA0, &[0x85]);
        assert_eq!(handle.tile(8).unwrap().segments, [5, 2, 3]);
        send(&mut bus, 8, 0xA0, &[0x05]);
        assert_eq!(handle.tile(8).unwrap().segments, [5, 0, 0]);
    }

    #[test]
    fn trigger_condition_waits_for_weight() {
        let (mut bus, handle) = SimulatedBus::new("sim");
        handle.add_tile(8);
        send(&mut bus, 8, 0xBC, &[0x5B, 0x49, 0x6D]);
        send(&mut bus, 0, command::LATCH, &[]);
        assert_eq!(handle.tile(8).unwrap().segments, [0, 0, 0]);
        handle.step_on(8);
        assert_eq!(handle.tile(8).unwrap().segments, [0x5B, 0x49, 0x6D]);
    }

    #[test]
    fn error_queue_keeps_newest_four() {
        let (mut bus, handle) = SimulatedBus::new("sim");
        handle.add_tile(8);
        for code in [0x50, 0x51, 0x52, 0x53, 0x54] {
            send(&mut bus, 8, code, &[]);
        }
        send(&mut bus, 8, command::RETURN_ERRORS, &[]);
        assert_eq!(drain(&mut bus), vec![0x54, 0x53, 0x52, 0x51]);
    }

    #[test]
    fn partial_write_then_failure() {
        let (mut bus, handle) = SimulatedBus::new("sim");
        handle.fail_next_write_after(1);
        assert_eq!(bus.write(&[0x09, 0x20, 0x01]).unwrap(), 1);
        assert!(bus.write(&[0x20, 0x01]).is_err());
        assert_eq!(bus.write(&[0x00, 0x00]).unwrap(), 2);
    }
}
