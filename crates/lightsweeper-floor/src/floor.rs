use std::collections::{BTreeSet, HashSet};
use std::thread;
use std::time::Duration;

use lightsweeper_frame::{Color, Condition, Shape, TileAddress};
use lightsweeper_tile::{TileControl, NO_CONTACT};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::FloorConfig;
use crate::error::{FloorError, Result};
use crate::grid::{Grid, Position};

/// A tile reading below the sensor threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorEvent {
    pub row: usize,
    pub col: usize,
    pub intensity: u16,
}

/// A grid of tiles driven as one floor.
///
/// Operations take a `(row, col)` selection as [`Grid::resolve`] does. When
/// a tile fails with a transport error its whole channel is marked dead;
/// the operation carries on with the other channels and later operations
/// skip the dead one until [`Floor::revive_channel`].
#[derive(Debug)]
pub struct Floor<T> {
    grid: Grid<T>,
    config: FloorConfig,
    dead: BTreeSet<String>,
}

impl<T: TileControl> Floor<T> {
    pub fn new(grid: Grid<T>, config: FloorConfig) -> Self {
        Self {
            grid,
            config,
            dead: BTreeSet::new(),
        }
    }

    pub fn grid(&self) -> &Grid<T> {
        &self.grid
    }

    pub fn config(&self) -> &FloorConfig {
        &self.config
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    /// Direct access to one tile, for operations the floor doesn't wrap.
    pub fn tile_mut(&mut self, row: usize, col: usize) -> Result<&mut T> {
        self.grid
            .get_mut(Position::new(row, col))
            .ok_or(FloorError::OutOfBounds { row, col })
    }

    pub fn resolve_tiles(&self, row: usize, col: usize) -> Result<Vec<Position>> {
        self.grid.resolve(row, col)
    }

    pub fn dead_channels(&self) -> impl Iterator<Item = &str> {
        self.dead.iter().map(String::as_str)
    }

    pub fn is_dead(&self, channel: &str) -> bool {
        self.dead.contains(channel)
    }

    /// Start using a dead channel again. Returns false if it wasn't dead.
    pub fn revive_channel(&mut self, channel: &str) -> bool {
        let revived = self.dead.remove(channel);
        if revived {
            info!(channel, "channel revived");
        }
        revived
    }

    /// Run `op` on each live tile in `positions`.
    fn for_each<F>(&mut self, positions: &[Position], mut op: F) -> Result<()>
    where
        F: FnMut(Position, &mut T) -> lightsweeper_tile::Result<()>,
    {
        for &position in positions {
            let Some(tile) = self.grid.get_mut(position) else {
                return Err(FloorError::OutOfBounds {
                    row: position.row,
                    col: position.col,
                });
            };
            if self.dead.contains(tile.channel_id()) {
                continue;
            }
            match op(position, tile) {
                Ok(()) => {}
                Err(err) if err.is_transport() => {
                    let channel = tile.channel_id().to_string();
                    warn!(%channel, %position, error = %err, "channel marked dead");
                    self.dead.insert(channel);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    pub fn set_color(&mut self, row: usize, col: usize, color: Color) -> Result<()> {
        let positions = self.grid.resolve(row, col)?;
        self.for_each(&positions, |_, tile| tile.set_color(color))
    }

    pub fn set_shape(&mut self, row: usize, col: usize, shape: Shape) -> Result<()> {
        let positions = self.grid.resolve(row, col)?;
        self.for_each(&positions, |_, tile| tile.set_shape(shape))
    }

    pub fn set_segments(
        &mut self,
        row: usize,
        col: usize,
        rgb: [Option<u8>; 3],
        condition: Condition,
    ) -> Result<()> {
        let positions = self.grid.resolve(row, col)?;
        self.for_each(&positions, |_, tile| tile.set_segments(rgb, condition))
    }

    pub fn set(&mut self, row: usize, col: usize, shape: Shape, color: Color) -> Result<()> {
        let positions = self.grid.resolve(row, col)?;
        self.for_each(&positions, |_, tile| tile.set(shape, color))
    }

    pub fn set_all_color(&mut self, color: Color) -> Result<()> {
        self.set_color(0, 0, color)
    }

    /// Read every sensor; readings below the threshold become events.
    pub fn poll_sensors(&mut self) -> Result<Vec<SensorEvent>> {
        let threshold = self.config.sensor_threshold;
        let positions = self.grid.resolve(0, 0)?;
        let mut events = Vec::new();
        self.for_each(&positions, |position, tile| {
            let intensity = tile.sensor_status()?;
            // Silence is never a step, whatever the threshold.
            if intensity != NO_CONTACT && intensity < threshold {
                events.push(SensorEvent {
                    row: position.row,
                    col: position.col,
                    intensity,
                });
            }
            Ok(())
        })?;
        if !events.is_empty() {
            debug!(count = events.len(), "sensor events");
        }
        Ok(events)
    }

    fn sweep(&mut self, color: Color, shape: Shape) -> Result<()> {
        let delay = self.config.tile_write_delay;
        let positions = self.grid.resolve(0, 0)?;
        self.for_each(&positions, |_, tile| {
            tile.set_color(color)?;
            tile.set_shape(shape)?;
            thread::sleep(delay);
            Ok(())
        })
    }

    /// One pass through the rainbow colors, every tile showing a zero,
    /// holding each color for `update_interval`.
    pub fn rainbow_mode(&mut self, update_interval: Duration) -> Result<()> {
        for color in Color::RAINBOW {
            self.sweep(color, Shape::ZERO)?;
            thread::sleep(update_interval);
        }
        Ok(())
    }

    /// Light every tile white with a zero, so a fresh floor shows it's alive.
    pub fn initialize_display(&mut self) -> Result<()> {
        self.sweep(Color::WHITE, Shape::ZERO)
    }

    /// Blank every tile.
    pub fn clear_board(&mut self) -> Result<()> {
        let positions = self.grid.resolve(0, 0)?;
        self.for_each(&positions, |_, tile| tile.blank())
    }

    /// Apply queued segment data on every channel at once.
    pub fn refresh_board(&mut self) -> Result<()> {
        let positions = self.grid.resolve(0, 0)?;
        let mut latched = HashSet::new();
        self.for_each(&positions, |_, tile| {
            if latched.insert(tile.channel_id().to_string()) {
                tile.latch(true)
            } else {
                Ok(())
            }
        })
    }

    /// Reset every tile.
    pub fn reset_board(&mut self) -> Result<()> {
        let positions = self.grid.resolve(0, 0)?;
        self.for_each(&positions, |_, tile| tile.reset())
    }

    /// Addresses by row, for diagnostics.
    pub fn addresses(&self) -> Vec<Vec<TileAddress>> {
        let mut rows = vec![Vec::with_capacity(self.cols()); self.rows()];
        for (position, tile) in self.grid.iter() {
            rows[position.row - 1].push(tile.address());
        }
        rows
    }

    /// Point the proxy at `(row, col)` to a new address.
    pub fn reassign_address(&mut self, row: usize, col: usize, address: TileAddress) -> Result<()> {
        self.grid.reassign(Position::new(row, col), address)
    }

    pub fn into_grid(self) -> Grid<T> {
        self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FloorLayout;
    use lightsweeper_tile::{SimulatedTile, TileError};

    fn floor(rows: usize, cols: usize) -> Floor<SimulatedTile> {
        let tiles = (0..rows * cols)
            .map(|i| {
                // Two channels: even rows on one, odd rows on the other.
                let row = i / cols;
                let channel = if row % 2 == 0 { "east" } else { "west" };
                let slot = ((row / 2) * cols + i % cols + 1) as u8;
                SimulatedTile::new(channel, TileAddress::slot(slot).unwrap())
            })
            .collect();
        let config = FloorConfig {
            tile_write_delay: Duration::ZERO,
            ..FloorConfig::default()
        };
        Floor::new(Grid::new(rows, cols, tiles).unwrap(), config)
    }

    fn writes(floor: &Floor<SimulatedTile>) -> usize {
        floor.grid().iter().map(|(_, t)| t.writes()).sum()
    }

    #[test]
    fn poll_reports_below_threshold_only() {
        let mut floor = floor(6, 8);
        floor.tile_mut(1, 1).unwrap().set_reading(50);
        floor.tile_mut(3, 4).unwrap().set_reading(100);

        let events = floor.poll_sensors().unwrap();
        assert_eq!(
            events,
            vec![SensorEvent {
                row: 1,
                col: 1,
                intensity: 50
            }]
        );
    }

    #[test]
    fn no_contact_is_never_an_event() {
        let mut floor = floor(1, 1);
        floor
            .tile_mut(1, 1)
            .unwrap()
            .set_reading(lightsweeper_tile::NO_CONTACT);
        assert!(floor.poll_sensors().unwrap().is_empty());
    }

    #[test]
    fn no_contact_stays_silent_above_the_sentinel() {
        let tiles = vec![
            SimulatedTile::new("east", TileAddress::FIRST),
            SimulatedTile::new("east", TileAddress::slot(2).unwrap()),
        ];
        let config = FloorConfig {
            sensor_threshold: 300,
            tile_write_delay: Duration::ZERO,
            ..FloorConfig::default()
        };
        let mut floor = Floor::new(Grid::new(1, 2, tiles).unwrap(), config);
        floor
            .tile_mut(1, 1)
            .unwrap()
            .set_reading(lightsweeper_tile::NO_CONTACT);
        floor.tile_mut(1, 2).unwrap().set_reading(255);

        assert_eq!(
            floor.poll_sensors().unwrap(),
            vec![SensorEvent {
                row: 1,
                col: 2,
                intensity: 255
            }]
        );
    }

    #[test]
    fn repeated_color_writes_once_per_tile() {
        let mut floor = floor(2, 3);
        floor.set_color(0, 0, Color::BLUE).unwrap();
        floor.set_color(0, 0, Color::BLUE).unwrap();
        assert_eq!(writes(&floor), 6);

        floor.set_color(2, 0, Color::RED).unwrap();
        assert_eq!(writes(&floor), 9);
        assert_eq!(floor.grid().get(Position::new(2, 2)).unwrap().color(), Some(Color::RED));
        assert_eq!(floor.grid().get(Position::new(1, 2)).unwrap().color(), Some(Color::BLUE));
    }

    #[test]
    fn column_selection() {
        let mut floor = floor(6, 8);
        floor.set_shape(0, 3, Shape::EIGHT).unwrap();
        let lit: Vec<Position> = floor
            .grid()
            .iter()
            .filter(|(_, t)| t.shape() == Some(Shape::EIGHT))
            .map(|(p, _)| p)
            .collect();
        assert_eq!(lit.len(), 6);
        assert!(lit.iter().all(|p| p.col == 3));
    }

    #[test]
    fn out_of_bounds_selection() {
        let mut floor = floor(2, 2);
        assert!(matches!(
            floor.set_color(3, 1, Color::RED),
            Err(FloorError::OutOfBounds { row: 3, col: 1 })
        ));
        assert!(floor.tile_mut(0, 1).is_err());
    }

    #[test]
    fn dead_channel_is_skipped_until_revived() {
        let mut floor = floor(2, 2);
        floor.tile_mut(1, 1).unwrap().set_offline(true);

        floor.set_all_color(Color::GREEN).unwrap();
        assert!(floor.is_dead("east"));
        assert_eq!(floor.dead_channels().collect::<Vec<_>>(), vec!["east"]);
        // (1, 2) shares the dead channel and was skipped; row 2 carried on.
        assert_eq!(floor.grid().get(Position::new(1, 2)).unwrap().color(), None);
        assert_eq!(floor.grid().get(Position::new(2, 1)).unwrap().color(), Some(Color::GREEN));

        floor.tile_mut(1, 1).unwrap().set_offline(false);
        assert!(floor.revive_channel("east"));
        assert!(!floor.revive_channel("east"));
        floor.set_all_color(Color::GREEN).unwrap();
        assert_eq!(floor.grid().get(Position::new(1, 2)).unwrap().color(), Some(Color::GREEN));
    }

    #[test]
    fn protocol_errors_abort() {
        let mut floor = floor(1, 2);
        let err = floor
            .set_segments(0, 0, [Some(0x80), None, None], Condition::Immediate)
            .unwrap_err();
        assert!(matches!(err, FloorError::Tile(TileError::Frame(_))));
        assert_eq!(floor.dead_channels().count(), 0);
    }

    #[test]
    fn rainbow_ends_white_with_zeros() {
        let mut floor = floor(2, 2);
        floor.rainbow_mode(Duration::ZERO).unwrap();
        for (_, tile) in floor.grid().iter() {
            assert_eq!(tile.color(), Some(Color::WHITE));
            assert_eq!(tile.shape(), Some(Shape::ZERO));
        }
        // 7 colors plus one shape write per tile.
        assert_eq!(writes(&floor), 4 * 8);
    }

    #[test]
    fn clear_board_blanks_every_tile() {
        let mut floor = floor(2, 2);
        floor.initialize_display().unwrap();
        floor.clear_board().unwrap();
        assert!(floor
            .grid()
            .iter()
            .all(|(_, t)| t.color() == Some(Color::BLACK)));
    }

    #[test]
    fn refresh_latches_once_per_channel() {
        let mut floor = floor(4, 2);
        floor
            .set_segments(0, 0, [Some(0), Some(0), Some(0x33)], Condition::OnLatch)
            .unwrap();
        let before = writes(&floor);
        floor.refresh_board().unwrap();
        assert_eq!(writes(&floor), before + 2);
        assert_eq!(floor.grid().get(Position::new(1, 1)).unwrap().segments(), [0, 0, 0x33]);
    }

    #[test]
    fn reassign_keeps_reverse_map() {
        let mut floor = floor(2, 2);
        let new = TileAddress::new(248).unwrap();
        floor.reassign_address(2, 2, new).unwrap();
        assert_eq!(floor.addresses()[1][1], new);
        assert_eq!(floor.grid().position_of("west", new), Some(Position::new(2, 2)));
        assert!(matches!(
            floor.reassign_address(2, 2, TileAddress::BROADCAST),
            Err(FloorError::BroadcastAssignment)
        ));
    }

    #[test]
    fn floor_from_layout() {
        let layout = FloorLayout::from_json(
            r#"{ "rows": 1, "cols": 2, "tiles": [
                { "row": 1, "col": 1, "channel": "a", "address": 8 },
                { "row": 1, "col": 2, "channel": "a", "address": 16 }
            ] }"#,
        )
        .unwrap();
        let mut floor = Floor::new(layout.simulated_tiles().unwrap(), FloorConfig::default());
        floor.reset_board().unwrap();
        assert_eq!(
            floor.addresses(),
            vec![vec![TileAddress::new(8).unwrap(), TileAddress::new(16).unwrap()]]
        );
    }
}
