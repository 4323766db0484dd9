//! A 2x3 floor on two simulated tile buses, no hardware needed.
//!
//! Run with:
//!   cargo run --example simulated-floor
//!
//! Every frame goes through the real tile proxies and the wire codec; the
//! simulated buses decode them and play the tile firmware.

use std::time::Duration;

use lightsweeper::floor::{Floor, FloorConfig, FloorLayout, TilePlacement};
use lightsweeper::frame::{Color, Shape, TileAddress};
use lightsweeper::serial::{LinkConfig, SerialLink};
use lightsweeper::tile::{RealTile, SimulatedBus};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LinkConfig {
        min_write_gap: Duration::ZERO,
        ..LinkConfig::default()
    };

    let mut links = Vec::new();
    let mut handles = Vec::new();
    for name in ["sim-east", "sim-west"] {
        let (bus, handle) = SimulatedBus::new(name);
        for address in [8, 16, 24] {
            handle.add_tile(address);
        }
        links.push(SerialLink::new(Box::new(bus), config));
        handles.push(handle);
    }

    let mut tiles = Vec::new();
    for (row, link) in links.iter().enumerate() {
        for col in 1..=3u8 {
            tiles.push(TilePlacement {
                row: row + 1,
                col: usize::from(col),
                channel: link.name(),
                address: TileAddress::slot(col)?,
            });
        }
    }
    let layout = FloorLayout {
        rows: 2,
        cols: 3,
        cells: None,
        tiles,
    };
    eprintln!("{}", layout.to_json()?);

    let grid = layout.build_grid(|placement| {
        let link = links
            .iter()
            .find(|link| link.name() == placement.channel)
            .cloned()
            .ok_or_else(|| lightsweeper::floor::FloorError::UnknownChannel(placement.channel.clone()))?;
        Ok(RealTile::new(link, placement.address))
    })?;

    let mut floor = Floor::new(
        grid,
        FloorConfig {
            tile_write_delay: Duration::ZERO,
            rainbow_interval: Duration::from_millis(50),
            ..FloorConfig::default()
        },
    );

    let interval = floor.config().rainbow_interval;
    floor.rainbow_mode(interval)?;
    floor.set(1, 0, Shape::digit(4)?, Color::GREEN)?;

    handles[1].set_sensor(16, 40);
    for event in floor.poll_sensors()? {
        eprintln!("stepped on ({}, {}) at {}", event.row, event.col, event.intensity);
    }

    for handle in &handles {
        eprintln!("{} frames on the wire", handle.frames().len());
    }
    floor.clear_board()?;
    Ok(())
}
