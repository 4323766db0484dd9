use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use lightsweeper_frame::TileAddress;
use lightsweeper_tile::{RealTile, SimulatedTile, TileControl};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::discovery::PortMap;
use crate::error::{FloorError, Result};
use crate::grid::Grid;
use crate::registry::ChannelRegistry;

/// Largest layout file [`FloorLayout::load`] accepts.
pub const MAX_LAYOUT_FILE_SIZE: u64 = 1024 * 1024;

/// Where one tile sits and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePlacement {
    pub row: usize,
    pub col: usize,
    pub channel: String,
    pub address: TileAddress,
}

/// Floor layout descriptor.
///
/// ```json
/// {
///   "rows": 1,
///   "cols": 2,
///   "tiles": [
///     { "row": 1, "col": 1, "channel": "/dev/ttyUSB0", "address": 8 },
///     { "row": 1, "col": 2, "channel": "/dev/ttyUSB0", "address": 16 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FloorLayout {
    pub rows: usize,
    pub cols: usize,
    /// Cell count, redundant with `rows * cols`; checked when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells: Option<usize>,
    pub tiles: Vec<TilePlacement>,
}

impl FloorLayout {
    /// Parse and validate a layout.
    pub fn from_json(json: &str) -> Result<Self> {
        let layout: Self = serde_json::from_str(json)?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a layout file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        if size > MAX_LAYOUT_FILE_SIZE {
            return Err(FloorError::Layout(format!(
                "{} is too large ({size} bytes)",
                path.display()
            )));
        }
        let mut json = String::new();
        file.take(MAX_LAYOUT_FILE_SIZE).read_to_string(&mut json)?;
        let layout = Self::from_json(&json)?;
        info!(path = %path.display(), rows = layout.rows, cols = layout.cols, "loaded floor layout");
        Ok(layout)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), tiles = self.tiles.len(), "wrote floor layout");
        Ok(())
    }

    /// Check that every cell is filled exactly once by a distinct tile.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(FloorError::Layout(format!(
                "rows and cols must be at least 1 (got {}x{})",
                self.rows, self.cols
            )));
        }
        let cells = self.rows * self.cols;
        if let Some(declared) = self.cells {
            if declared != cells {
                return Err(FloorError::Layout(format!(
                    "cells is {declared} but the grid is {}x{}",
                    self.rows, self.cols
                )));
            }
        }
        if self.tiles.len() != cells {
            return Err(FloorError::Layout(format!(
                "{} tiles for {cells} cells",
                self.tiles.len()
            )));
        }

        let mut seen_cells = HashSet::with_capacity(cells);
        let mut seen_tiles = HashSet::with_capacity(cells);
        for tile in &self.tiles {
            if !(1..=self.rows).contains(&tile.row) || !(1..=self.cols).contains(&tile.col) {
                return Err(FloorError::Layout(format!(
                    "cell ({}, {}) is outside the {}x{} grid",
                    tile.row, tile.col, self.rows, self.cols
                )));
            }
            if tile.address.is_broadcast() {
                return Err(FloorError::BroadcastAssignment);
            }
            if !seen_cells.insert((tile.row, tile.col)) {
                return Err(FloorError::Layout(format!(
                    "cell ({}, {}) appears twice",
                    tile.row, tile.col
                )));
            }
            if !seen_tiles.insert((tile.channel.as_str(), tile.address)) {
                return Err(FloorError::Layout(format!(
                    "address {} on {} appears twice",
                    tile.address, tile.channel
                )));
            }
        }
        Ok(())
    }

    /// Lay discovered tiles out row by row, `cols` to a row, in port then
    /// address order.
    pub fn from_port_map(map: &PortMap, cols: usize) -> Result<Self> {
        let found: Vec<(&String, TileAddress)> = map
            .channels
            .iter()
            .flat_map(|(port, addresses)| addresses.iter().map(move |a| (port, *a)))
            .collect();
        if cols == 0 || found.is_empty() || found.len() % cols != 0 {
            return Err(FloorError::Layout(format!(
                "{} tiles don't fill rows of {cols}",
                found.len()
            )));
        }

        let tiles = found
            .into_iter()
            .enumerate()
            .map(|(i, (port, address))| TilePlacement {
                row: i / cols + 1,
                col: i % cols + 1,
                channel: port.clone(),
                address,
            })
            .collect::<Vec<_>>();
        let layout = Self {
            rows: tiles.len() / cols,
            cols,
            cells: Some(tiles.len()),
            tiles,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Every channel the layout refers to.
    pub fn channels(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = self.tiles.iter().map(|t| t.channel.as_str()).collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }

    /// Build a grid, creating each tile with `make`.
    pub fn build_grid<T, F>(&self, mut make: F) -> Result<Grid<T>>
    where
        T: TileControl,
        F: FnMut(&TilePlacement) -> Result<T>,
    {
        self.validate()?;
        let mut placements: Vec<&TilePlacement> = self.tiles.iter().collect();
        placements.sort_by_key(|t| (t.row, t.col));
        let tiles = placements
            .into_iter()
            .map(&mut make)
            .collect::<Result<Vec<T>>>()?;
        Grid::new(self.rows, self.cols, tiles)
    }

    /// Proxies for the physical tiles, on links from `registry`.
    pub fn real_tiles(&self, registry: &ChannelRegistry) -> Result<Grid<RealTile>> {
        self.build_grid(|placement| {
            let link = registry.require(&placement.channel)?;
            Ok(RealTile::new(link, placement.address))
        })
    }

    /// In-memory tiles with the same addressing.
    pub fn simulated_tiles(&self) -> Result<Grid<SimulatedTile>> {
        self.build_grid(|placement| Ok(SimulatedTile::new(placement.channel.clone(), placement.address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;

    const TWO_BY_TWO: &str = r#"{
        "rows": 2,
        "cols": 2,
        "cells": 4,
        "tiles": [
            { "row": 2, "col": 2, "channel": "COM4", "address": 16 },
            { "row": 1, "col": 1, "channel": "COM3", "address": 8 },
            { "row": 1, "col": 2, "channel": "COM3", "address": 16 },
            { "row": 2, "col": 1, "channel": "COM4", "address": 8 }
        ]
    }"#;

    #[test]
    fn parses_and_builds_in_row_major_order() {
        let layout = FloorLayout::from_json(TWO_BY_TWO).unwrap();
        assert_eq!(layout.channels(), vec!["COM3", "COM4"]);

        let grid = layout.simulated_tiles().unwrap();
        let tile = grid.get(Position::new(2, 2)).unwrap();
        assert_eq!(tile.channel_id(), "COM4");
        assert_eq!(tile.address().get(), 16);
        assert_eq!(
            grid.position_of("COM3", TileAddress::new(16).unwrap()),
            Some(Position::new(1, 2))
        );
    }

    #[test]
    fn rejects_missing_cell() {
        let json = r#"{ "rows": 1, "cols": 2, "tiles": [
            { "row": 1, "col": 1, "channel": "a", "address": 8 }
        ] }"#;
        assert!(matches!(FloorLayout::from_json(json), Err(FloorError::Layout(_))));
    }

    #[test]
    fn rejects_duplicate_address() {
        let json = r#"{ "rows": 1, "cols": 2, "tiles": [
            { "row": 1, "col": 1, "channel": "a", "address": 8 },
            { "row": 1, "col": 2, "channel": "a", "address": 8 }
        ] }"#;
        assert!(matches!(FloorLayout::from_json(json), Err(FloorError::Layout(_))));
    }

    #[test]
    fn rejects_broadcast_and_unaligned_addresses() {
        let broadcast = r#"{ "rows": 1, "cols": 1, "tiles": [
            { "row": 1, "col": 1, "channel": "a", "address": 0 }
        ] }"#;
        assert!(matches!(
            FloorLayout::from_json(broadcast),
            Err(FloorError::BroadcastAssignment)
        ));

        let unaligned = broadcast.replace("\"address\": 0", "\"address\": 12");
        assert!(matches!(FloorLayout::from_json(&unaligned), Err(FloorError::Json(_))));
    }

    #[test]
    fn rejects_wrong_cell_count() {
        let json = TWO_BY_TWO.replace("\"cells\": 4", "\"cells\": 5");
        assert!(matches!(FloorLayout::from_json(&json), Err(FloorError::Layout(_))));
    }

    #[test]
    fn from_port_map_fills_rows() {
        let mut map = PortMap::default();
        map.channels.insert(
            "b".into(),
            vec![TileAddress::new(8).unwrap(), TileAddress::new(16).unwrap()],
        );
        map.channels.insert(
            "a".into(),
            vec![TileAddress::new(40).unwrap(), TileAddress::new(48).unwrap()],
        );

        let layout = FloorLayout::from_port_map(&map, 2).unwrap();
        assert_eq!((layout.rows, layout.cols), (2, 2));
        assert_eq!(layout.tiles[0].channel, "a");
        assert_eq!(layout.tiles[2].channel, "b");
        assert_eq!((layout.tiles[3].row, layout.tiles[3].col), (2, 2));

        assert!(FloorLayout::from_port_map(&map, 3).is_err());
    }

    #[test]
    fn unknown_channel_when_building_real_tiles() {
        let layout = FloorLayout::from_json(TWO_BY_TWO).unwrap();
        let registry = ChannelRegistry::new();
        assert!(matches!(
            layout.real_tiles(&registry),
            Err(FloorError::UnknownChannel(_))
        ));
    }

    #[test]
    fn save_and_load() {
        let dir = std::env::temp_dir().join(format!("lightsweeper-layout-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("floor.json");

        let layout = FloorLayout::from_json(TWO_BY_TWO).unwrap();
        layout.save(&path).unwrap();
        assert_eq!(FloorLayout::load(&path).unwrap(), layout);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
