use std::collections::BTreeMap;

use lightsweeper_frame::command::eeprom;
use lightsweeper_frame::TileAddress;
use lightsweeper_serial::{available_ports, open_link, LinkConfig, SerialLink};
use lightsweeper_tile::{RealTile, TileControl, TileError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{FloorError, Result};
use crate::registry::ChannelRegistry;

/// Where discovery gets its ports from.
pub trait PortOpener {
    /// Names of the ports that might have tiles.
    fn list(&mut self) -> lightsweeper_serial::Result<Vec<String>>;

    /// Open one port.
    fn open(&mut self, name: &str) -> lightsweeper_serial::Result<SerialLink>;
}

/// Operating-system serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts {
    config: LinkConfig,
}

impl SystemPorts {
    pub fn new(config: LinkConfig) -> Self {
        Self { config }
    }
}

impl PortOpener for SystemPorts {
    fn list(&mut self) -> lightsweeper_serial::Result<Vec<String>> {
        available_ports()
    }

    fn open(&mut self, name: &str) -> lightsweeper_serial::Result<SerialLink> {
        open_link(name, self.config)
    }
}

/// Result of walking the address space of one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyReport {
    pub port: String,
    /// Addresses with at least one tile, ascending.
    pub live: Vec<TileAddress>,
    /// Addresses where more than one tile answered.
    pub conflicts: Vec<TileAddress>,
    /// Slots probed; always all 31.
    pub tried: usize,
}

/// A port that failed during [`Discovery::build_port_map`].
#[derive(Debug)]
pub struct PortFailure {
    pub port: String,
    pub error: FloorError,
}

/// Live addresses per port, plus whatever went wrong along the way.
#[derive(Debug, Default)]
pub struct PortMap {
    pub channels: BTreeMap<String, Vec<TileAddress>>,
    pub failures: Vec<PortFailure>,
}

impl PortMap {
    /// Number of live tiles over all ports.
    pub fn tile_count(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Finds tiles and keeps the links it opened.
#[derive(Debug)]
pub struct Discovery<O = SystemPorts> {
    opener: O,
    registry: ChannelRegistry,
}

impl Discovery<SystemPorts> {
    /// Discovery over the operating-system serial ports.
    pub fn new(config: LinkConfig) -> Self {
        Self::with_opener(SystemPorts::new(config))
    }
}

impl<O: PortOpener> Discovery<O> {
    pub fn with_opener(opener: O) -> Self {
        Self {
            opener,
            registry: ChannelRegistry::new(),
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Give up discovery and keep the open links.
    pub fn into_registry(self) -> ChannelRegistry {
        self.registry
    }

    pub fn enumerate_channels(&mut self) -> Result<Vec<String>> {
        let ports = self.opener.list()?;
        info!(count = ports.len(), "enumerated serial ports");
        Ok(ports)
    }

    /// The registered link for `name`, opening it first if needed.
    pub fn open_channel(&mut self, name: &str) -> Result<SerialLink> {
        if let Some(link) = self.registry.get(name).filter(|link| link.is_open()) {
            return Ok(link.clone());
        }
        let link = self.opener.open(name)?;
        self.registry.insert(link.clone());
        Ok(link)
    }

    /// Ask every tile on `name` for its version.
    ///
    /// Any answer means at least one tile is alive and the link stays
    /// registered. A silent port is closed again.
    pub fn probe_channel(&mut self, name: &str) -> Result<bool> {
        let link = self.open_channel(name)?;
        let mut probe = RealTile::broadcast(link);
        match probe.version() {
            Ok(answers) => {
                info!(port = name, answers = answers.len(), "tiles present");
                Ok(true)
            }
            Err(TileError::NoResponse { .. }) => {
                debug!(port = name, "no tiles answered");
                self.registry.remove(name);
                Ok(false)
            }
            Err(err) => {
                self.registry.remove(name);
                Err(err.into())
            }
        }
    }

    /// Read EEPROM offset 0 at each of the 31 tile addresses on `name`.
    pub fn survey_addresses(&mut self, name: &str) -> Result<SurveyReport> {
        let link = self.open_channel(name)?;
        let mut probe = RealTile::new(link, TileAddress::FIRST);
        let mut report = SurveyReport {
            port: name.to_string(),
            live: Vec::new(),
            conflicts: Vec::new(),
            tried: 0,
        };

        for address in TileAddress::all_tiles() {
            probe.assign_address(address);
            let reply = probe.eeprom_read_raw(eeprom::ADDRESS)?;
            report.tried += 1;
            match reply.len() {
                0 => {}
                1 => report.live.push(address),
                answers => {
                    warn!(port = name, %address, answers, "address conflict");
                    report.live.push(address);
                    report.conflicts.push(address);
                }
            }
        }

        info!(
            port = name,
            live = report.live.len(),
            conflicts = report.conflicts.len(),
            "address survey done"
        );
        Ok(report)
    }

    /// Probe and survey every port.
    ///
    /// A port that fails is recorded in [`PortMap::failures`] and closed;
    /// the others carry on. Address conflicts are recorded as failures too,
    /// but their port stays in the map.
    pub fn build_port_map(&mut self) -> Result<PortMap> {
        let mut map = PortMap::default();
        for port in self.enumerate_channels()? {
            match self.probe_channel(&port) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(error) => {
                    warn!(%port, %error, "probe failed");
                    map.failures.push(PortFailure { port, error });
                    continue;
                }
            }

            match self.survey_addresses(&port) {
                Ok(report) => {
                    for address in &report.conflicts {
                        map.failures.push(PortFailure {
                            port: port.clone(),
                            error: FloorError::AddressConflict {
                                port: port.clone(),
                                address: *address,
                            },
                        });
                    }
                    map.channels.insert(port, report.live);
                }
                Err(error) => {
                    warn!(%port, %error, "survey failed");
                    self.registry.remove(&port);
                    map.failures.push(PortFailure { port, error });
                }
            }
        }

        info!(
            ports = map.channels.len(),
            tiles = map.tile_count(),
            failures = map.failures.len(),
            "port map built"
        );
        Ok(map)
    }

    /// Have the tile pick a random free address. Re-survey afterwards.
    pub fn randomize_address(&self, tile: &mut RealTile) -> Result<()> {
        tile.randomize_address()?;
        info!(port = tile.channel_id(), from = %tile.address(), "address randomized, re-survey needed");
        Ok(())
    }

    /// Persist `address` as the tile's own address and follow it.
    pub fn write_address(&self, tile: &mut RealTile, address: TileAddress) -> Result<()> {
        if address.is_broadcast() {
            return Err(FloorError::BroadcastAssignment);
        }
        tile.store_address(address)?;
        Ok(())
    }

    /// Split up the tiles sharing `address` on `name`, then re-survey.
    pub fn resolve_conflict(&mut self, name: &str, address: TileAddress) -> Result<SurveyReport> {
        let link = self.open_channel(name)?;
        let mut tile = RealTile::new(link, address);
        self.randomize_address(&mut tile)?;
        self.survey_addresses(name)
    }
}
