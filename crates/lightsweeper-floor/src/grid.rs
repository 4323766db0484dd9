use std::collections::HashMap;
use std::fmt;

use lightsweeper_frame::TileAddress;
use lightsweeper_tile::TileControl;
use serde::Serialize;

use crate::error::{FloorError, Result};

/// A 1-based grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Tiles laid out in rows and columns, with a reverse map from
/// `(channel, address)` back to the cell.
#[derive(Debug)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
    index: HashMap<(String, TileAddress), Position>,
}

impl<T: TileControl> Grid<T> {
    /// Build a grid from tiles in row-major order.
    ///
    /// No cell may use the broadcast address.
    pub fn new(rows: usize, cols: usize, tiles: Vec<T>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(FloorError::Layout(format!("empty grid {rows}x{cols}")));
        }
        if tiles.len() != rows * cols {
            return Err(FloorError::Layout(format!(
                "{} tiles can't fill a {rows}x{cols} grid",
                tiles.len()
            )));
        }

        let mut index = HashMap::with_capacity(tiles.len());
        for (i, tile) in tiles.iter().enumerate() {
            if tile.address().is_broadcast() {
                return Err(FloorError::BroadcastAssignment);
            }
            let position = Position::new(i / cols + 1, i % cols + 1);
            let key = (tile.channel_id().to_string(), tile.address());
            if let Some(previous) = index.insert(key, position) {
                return Err(FloorError::Layout(format!(
                    "{} and {position} both use address {} on {}",
                    previous,
                    tile.address(),
                    tile.channel_id()
                )));
            }
        }

        Ok(Self {
            rows,
            cols,
            cells: tiles,
            index,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn offset(&self, position: Position) -> Option<usize> {
        let in_range = (1..=self.rows).contains(&position.row) && (1..=self.cols).contains(&position.col);
        in_range.then(|| (position.row - 1) * self.cols + (position.col - 1))
    }

    pub fn get(&self, position: Position) -> Option<&T> {
        self.offset(position).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, position: Position) -> Option<&mut T> {
        self.offset(position).map(|i| &mut self.cells[i])
    }

    /// Positions selected by `(row, col)`.
    ///
    /// `(0, 0)` is the whole grid, `(r, 0)` row `r`, `(0, c)` column `c`,
    /// anything else the single cell.
    pub fn resolve(&self, row: usize, col: usize) -> Result<Vec<Position>> {
        let out_of_bounds = || FloorError::OutOfBounds { row, col };
        if row > self.rows || col > self.cols {
            return Err(out_of_bounds());
        }

        let positions = match (row, col) {
            (0, 0) => (1..=self.rows)
                .flat_map(|r| (1..=self.cols).map(move |c| Position::new(r, c)))
                .collect(),
            (r, 0) => (1..=self.cols).map(|c| Position::new(r, c)).collect(),
            (0, c) => (1..=self.rows).map(|r| Position::new(r, c)).collect(),
            (r, c) => vec![Position::new(r, c)],
        };
        Ok(positions)
    }

    /// Cell of the tile at `address` on `channel`.
    pub fn position_of(&self, channel: &str, address: TileAddress) -> Option<Position> {
        self.index.get(&(channel.to_string(), address)).copied()
    }

    /// Point the tile at `position` to a new address, keeping the reverse
    /// map in step.
    pub fn reassign(&mut self, position: Position, address: TileAddress) -> Result<()> {
        let offset = self.offset(position).ok_or(FloorError::OutOfBounds {
            row: position.row,
            col: position.col,
        })?;
        if address.is_broadcast() {
            return Err(FloorError::BroadcastAssignment);
        }
        let channel = self.cells[offset].channel_id().to_string();
        let old = self.cells[offset].address();
        if old == address {
            return Ok(());
        }
        let new_key = (channel.clone(), address);
        if self.index.contains_key(&new_key) {
            return Err(FloorError::AddressConflict {
                port: channel,
                address,
            });
        }

        self.index.remove(&(channel, old));
        self.index.insert(new_key, position);
        self.cells[offset].assign_address(address);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, &T)> {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, tile)| (Position::new(i / cols + 1, i % cols + 1), tile))
    }

    pub fn into_tiles(self) -> Vec<T> {
        self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightsweeper_tile::SimulatedTile;

    fn grid(rows: usize, cols: usize) -> Grid<SimulatedTile> {
        let tiles = (0..rows * cols)
            .map(|i| {
                let channel = format!("sim{}", i / 31);
                let slot = (i % 31) as u8 + 1;
                SimulatedTile::new(channel, TileAddress::slot(slot).unwrap())
            })
            .collect();
        Grid::new(rows, cols, tiles).unwrap()
    }

    #[test]
    fn resolve_selection_sizes() {
        let g = grid(6, 8);
        assert_eq!(g.resolve(0, 0).unwrap().len(), 48);

        let row = g.resolve(2, 0).unwrap();
        assert_eq!(row.len(), 8);
        assert!(row.iter().all(|p| p.row == 2));

        let col = g.resolve(0, 3).unwrap();
        assert_eq!(col.len(), 6);
        assert!(col.iter().all(|p| p.col == 3));

        assert_eq!(g.resolve(2, 3).unwrap(), vec![Position::new(2, 3)]);
    }

    #[test]
    fn resolve_out_of_bounds() {
        let g = grid(6, 8);
        assert!(matches!(
            g.resolve(7, 0),
            Err(FloorError::OutOfBounds { row: 7, col: 0 })
        ));
        assert!(g.resolve(0, 9).is_err());
        assert!(g.resolve(6, 8).is_ok());
    }

    #[test]
    fn reverse_map_follows_reassignment() {
        let mut g = grid(2, 2);
        let pos = Position::new(2, 1);
        let old = g.get(pos).unwrap().address();
        let new = TileAddress::new(200).unwrap();

        g.reassign(pos, new).unwrap();
        assert_eq!(g.get(pos).unwrap().address(), new);
        assert_eq!(g.position_of("sim0", new), Some(pos));
        assert_eq!(g.position_of("sim0", old), None);
    }

    #[test]
    fn reassign_refuses_taken_address() {
        let mut g = grid(2, 2);
        let taken = g.get(Position::new(1, 1)).unwrap().address();
        assert!(matches!(
            g.reassign(Position::new(1, 2), taken),
            Err(FloorError::AddressConflict { .. })
        ));
    }

    #[test]
    fn duplicate_tiles_rejected() {
        let tiles = vec![
            SimulatedTile::new("a", TileAddress::FIRST),
            SimulatedTile::new("a", TileAddress::FIRST),
        ];
        assert!(matches!(Grid::new(1, 2, tiles), Err(FloorError::Layout(_))));
    }

    #[test]
    fn broadcast_address_never_fills_a_cell() {
        let tiles = vec![SimulatedTile::new("a", TileAddress::BROADCAST)];
        assert!(matches!(
            Grid::new(1, 1, tiles),
            Err(FloorError::BroadcastAssignment)
        ));

        let mut g = grid(2, 2);
        let pos = Position::new(1, 1);
        let before = g.get(pos).unwrap().address();
        assert!(matches!(
            g.reassign(pos, TileAddress::BROADCAST),
            Err(FloorError::BroadcastAssignment)
        ));
        assert_eq!(g.get(pos).unwrap().address(), before);
        assert_eq!(g.position_of("sim0", before), Some(pos));
    }

    #[test]
    fn iter_is_row_major() {
        let g = grid(2, 3);
        let positions: Vec<Position> = g.iter().map(|(p, _)| p).collect();
        assert_eq!(positions[0], Position::new(1, 1));
        assert_eq!(positions[3], Position::new(2, 1));
        assert_eq!(positions[5], Position::new(2, 3));
    }
}
