//! The spatial index: a bounded 2D grid of terrain squares holding things

use crate::identity::ThingId;
use crate::thing::Thing;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Terrain of one grid square
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    /// Terrain name, e.g. "plains" or "river"
    pub name: String,
    /// Movement cost to enter a square of this terrain
    pub cost: f64,
    /// Whether this square is water
    pub is_water: bool,
}

impl Terrain {
    /// Create a land terrain
    pub fn land(name: impl Into<String>, cost: f64) -> Self {
        Self {
            name: name.into(),
            cost,
            is_water: false,
        }
    }

    /// Create a water terrain
    pub fn water(name: impl Into<String>, cost: f64) -> Self {
        Self {
            name: name.into(),
            cost,
            is_water: true,
        }
    }
}

/// One square of the grid
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridSquare {
    /// Terrain, shared across step snapshots
    pub terrain: Option<Arc<Terrain>>,
    /// Things currently on this square
    pub things: Vec<Thing>,
}

/// A bounded 2D grid
///
/// All coordinate access clamps to `[0, width-1] x [0, height-1]`; callers
/// can pass out-of-range (including negative) coordinates safely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    squares: Vec<GridSquare>,
}

impl Grid {
    /// Create an empty grid; dimensions are clamped to at least 1x1
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            squares: vec![GridSquare::default(); (width * height) as usize],
        }
    }

    /// Grid width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Clamp signed coordinates into the grid bounds
    pub fn clamp(&self, x: i64, y: i64) -> (u32, u32) {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        (cx, cy)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        (y * self.width + x) as usize
    }

    /// Get a square (clamped)
    pub fn square(&self, x: u32, y: u32) -> &GridSquare {
        &self.squares[self.index(x, y)]
    }

    /// Get a square mutably (clamped)
    pub fn square_mut(&mut self, x: u32, y: u32) -> &mut GridSquare {
        let i = self.index(x, y);
        &mut self.squares[i]
    }

    /// Set the terrain of a square
    pub fn set_terrain(&mut self, x: u32, y: u32, terrain: Arc<Terrain>) {
        self.square_mut(x, y).terrain = Some(terrain);
    }

    /// Place a thing on the square it says it occupies (clamped)
    pub fn place(&mut self, mut thing: Thing) {
        let (x, y) = self.clamp(thing.x as i64, thing.y as i64);
        thing.set_position(x, y);
        self.square_mut(x, y).things.push(thing);
    }

    /// Iterate all things in grid-scan order: x outer, y inner
    ///
    /// This order drives per-step RNG consumption and must stay stable.
    pub fn things(&self) -> impl Iterator<Item = &Thing> {
        (0..self.width).flat_map(move |x| {
            (0..self.height).flat_map(move |y| self.square(x, y).things.iter())
        })
    }

    /// Count all things on the grid
    pub fn thing_count(&self) -> usize {
        self.squares.iter().map(|s| s.things.len()).sum()
    }

    /// Find a thing anywhere on the grid by identity
    pub fn find_thing(&self, id: ThingId) -> Option<&Thing> {
        self.things().find(|t| t.id == id)
    }

    /// The square coordinates within `radius` of a center, clamped and
    /// deduplicated, in deterministic scan order
    pub fn squares_within(&self, x: u32, y: u32, radius: u32) -> Vec<(u32, u32)> {
        let (x0, y0) = self.clamp(x as i64 - radius as i64, y as i64 - radius as i64);
        let (x1, y1) = self.clamp(x as i64 + radius as i64, y as i64 + radius as i64);
        let mut out = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)) as usize);
        for sx in x0..=x1 {
            for sy in y0..=y1 {
                out.push((sx, sy));
            }
        }
        out
    }

    /// Structural clone for the next step: terrain shared, thing lists empty
    pub fn clone_without_things(&self) -> Grid {
        Grid {
            width: self.width,
            height: self.height,
            squares: self
                .squares
                .iter()
                .map(|s| GridSquare {
                    terrain: s.terrain.clone(),
                    things: Vec::new(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thing::ThingKind;

    #[test]
    fn test_clamping() {
        let grid = Grid::new(10, 5);
        assert_eq!(grid.clamp(-3, 2), (0, 2));
        assert_eq!(grid.clamp(100, 100), (9, 4));
        assert_eq!(grid.clamp(4, -1), (4, 0));
    }

    #[test]
    fn test_place_and_find() {
        let mut grid = Grid::new(4, 4);
        let mut thing = Thing::new(ThingId::new(1), ThingKind::Site, "village", 9, 9);
        thing.set_attribute("Population", 10);
        grid.place(thing);

        // position was clamped
        let found = grid.find_thing(ThingId::new(1)).unwrap();
        assert_eq!(found.position(), (3, 3));
        assert_eq!(grid.thing_count(), 1);
    }

    #[test]
    fn test_scan_order() {
        let mut grid = Grid::new(3, 3);
        grid.place(Thing::new(ThingId::new(1), ThingKind::Generic, "a", 2, 0));
        grid.place(Thing::new(ThingId::new(2), ThingKind::Generic, "b", 0, 1));
        grid.place(Thing::new(ThingId::new(3), ThingKind::Generic, "c", 0, 0));

        // x outer, y inner: (0,0) before (0,1) before (2,0)
        let ids: Vec<u64> = grid.things().map(|t| t.id.raw()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_squares_within_clamps() {
        let grid = Grid::new(5, 5);
        let squares = grid.squares_within(0, 0, 1);
        assert_eq!(squares, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);

        let all = grid.squares_within(2, 2, 10);
        assert_eq!(all.len(), 25);
    }

    #[test]
    fn test_clone_without_things() {
        let mut grid = Grid::new(2, 2);
        let terrain = Arc::new(Terrain::land("plains", 1.0));
        grid.set_terrain(1, 1, terrain.clone());
        grid.place(Thing::new(ThingId::new(1), ThingKind::Unit, "warband", 1, 1));

        let cloned = grid.clone_without_things();
        assert_eq!(cloned.thing_count(), 0);
        // terrain is shared, not copied
        let original = grid.square(1, 1).terrain.as_ref().unwrap();
        let kept = cloned.square(1, 1).terrain.as_ref().unwrap();
        assert!(Arc::ptr_eq(original, kept));
    }
}
