use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use lightsweeper_floor::{ChannelRegistry, Floor, FloorConfig, FloorLayout};
use lightsweeper_serial::{open_link, LinkConfig, DEFAULT_BAUD_RATE};
use lightsweeper_tile::{RealTile, TileControl};
use tracing::warn;

use crate::exit::{channel_error, floor_error, CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR, USAGE};
use crate::output::OutputFormat;

pub mod clear;
pub mod discover;
pub mod poll;
pub mod ports;
pub mod rainbow;
pub mod tile;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports.
    Ports,
    /// Walk every port for tiles and print the port map.
    Discover(DiscoverArgs),
    /// Send one command to one tile.
    Tile(TileArgs),
    /// Cycle every tile through the rainbow.
    Rainbow(RainbowArgs),
    /// Print sensor events as tiles are stepped on.
    Poll(PollArgs),
    /// Blank every tile on a floor.
    Clear(ClearArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, link: LinkConfig) -> CliResult<i32> {
    match command {
        Command::Ports => ports::run(format),
        Command::Discover(args) => discover::run(args, format, link),
        Command::Tile(args) => tile::run(args, format, link),
        Command::Rainbow(args) => rainbow::run(args, format, link),
        Command::Poll(args) => poll::run(args, format, link),
        Command::Clear(args) => clear::run(args, format, link),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE, global = true)]
    pub baud: u32,
    /// How long to wait for a tile to answer (e.g. 10ms).
    #[arg(long, value_name = "DURATION", default_value = "10ms", global = true)]
    pub read_timeout: String,
}

impl LinkArgs {
    pub fn config(&self) -> CliResult<LinkConfig> {
        if self.baud == 0 {
            return Err(CliError::usage("baud rate must be greater than zero"));
        }
        Ok(LinkConfig {
            baud_rate: self.baud,
            read_timeout: parse_duration(&self.read_timeout)?,
            ..LinkConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Only look at these ports (repeatable). Default: every port.
    #[arg(long = "port", value_name = "PORT")]
    pub ports: Vec<String>,
    /// Write a floor layout of the tiles found.
    #[arg(long, value_name = "FILE", requires = "cols")]
    pub write_layout: Option<PathBuf>,
    /// Tiles per row in the written layout.
    #[arg(long)]
    pub cols: Option<usize>,
}

#[derive(Args, Debug)]
pub struct TileArgs {
    /// Serial port the tile is on.
    pub port: String,
    /// Tile address (8, 16, ... 248; 0 reaches every tile on the port).
    pub address: u16,
    #[command(subcommand)]
    pub action: TileAction,
}

#[derive(Subcommand, Debug)]
pub enum TileAction {
    /// Read the firmware version.
    Version,
    /// Set the display color (black, red, green, yellow, blue, violet, cyan, white).
    Color { name: String },
    /// Light segments from a 7-bit mask (e.g. 0x7E).
    Shape { mask: String },
    /// Show a decimal digit.
    Digit { digit: u8 },
    /// Read one EEPROM byte.
    EepromRead { offset: u8 },
    /// Write one EEPROM byte.
    EepromWrite { offset: u8, value: u8 },
    /// Read the pressure sensor.
    Sensor,
    /// Read the status byte.
    Status,
    /// Read the error queue.
    Errors,
    /// Read the ADC statistics.
    Adc,
    /// Flash the tile so it can be found on the floor.
    Locate,
    /// Turn the display upside down.
    Flip,
    /// Turn the display right way up.
    Unflip,
    /// Reset the tile and print what it says on boot.
    Reset,
    /// Apply staged segment changes.
    Latch {
        /// Latch every tile on the port.
        #[arg(long)]
        all: bool,
    },
    /// Ask the tile to pick a random address.
    Randomize,
    /// Resynchronize the port.
    Sync,
    /// Store a new address in EEPROM.
    SetAddress { address: u16 },
}

#[derive(Args, Debug)]
pub struct LayoutArgs {
    /// Floor layout file.
    #[arg(long, value_name = "FILE")]
    pub layout: PathBuf,
    /// Pause between tile writes (e.g. 5ms).
    #[arg(long, value_name = "DURATION")]
    pub write_delay: Option<String>,
}

impl LayoutArgs {
    pub fn floor_config(&self) -> CliResult<FloorConfig> {
        let mut config = FloorConfig::default();
        if let Some(delay) = &self.write_delay {
            config.tile_write_delay = parse_duration(delay)?;
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct RainbowArgs {
    #[command(flatten)]
    pub floor: LayoutArgs,
    /// Stop after N full cycles. Default: run until Ctrl-C.
    #[arg(long)]
    pub cycles: Option<usize>,
    /// Time each color is shown (e.g. 400ms).
    #[arg(long, value_name = "DURATION")]
    pub interval: Option<String>,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    #[command(flatten)]
    pub floor: LayoutArgs,
    /// Exit after N sensor events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Readings below this count as a step.
    #[arg(long)]
    pub threshold: Option<u16>,
    /// Pause between sweeps of the floor (e.g. 50ms).
    #[arg(long, value_name = "DURATION", default_value = "50ms")]
    pub interval: String,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    #[command(flatten)]
    pub floor: LayoutArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Load a layout and open each of its channels.
pub fn open_floor(path: &Path, link: LinkConfig, config: FloorConfig) -> CliResult<Floor<RealTile>> {
    let layout = FloorLayout::load(path).map_err(|err| floor_error("layout", err))?;

    let mut registry = ChannelRegistry::new();
    for channel in layout.channels() {
        let opened = open_link(channel, link).map_err(|err| channel_error("open failed", err))?;
        registry.insert(opened);
    }

    let grid = layout
        .real_tiles(&registry)
        .map_err(|err| floor_error("layout", err))?;
    Ok(Floor::new(grid, config))
}

/// Exit code for a floor run: a dead channel means only part of the floor
/// was driven.
pub fn floor_exit_code(floor: &Floor<RealTile>) -> i32 {
    let dead: Vec<&str> = floor.dead_channels().collect();
    if dead.is_empty() {
        SUCCESS
    } else {
        warn!(channels = ?dead, "some channels went dead");
        TRANSPORT_ERROR
    }
}

/// True once every channel of the floor has been marked dead.
pub fn all_dead(floor: &Floor<RealTile>) -> bool {
    floor
        .grid()
        .iter()
        .all(|(_, tile)| floor.is_dead(tile.channel_id()))
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Parse `150ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_millis() {
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0ms").is_err());
        assert!(parse_duration("soon").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn zero_baud_is_usage_error() {
        let args = LinkArgs {
            baud: 0,
            read_timeout: "10ms".into(),
        };
        assert_eq!(args.config().unwrap_err().code, USAGE);
    }
}
