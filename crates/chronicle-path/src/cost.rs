//! Per-square movement cost view of a world grid

use chronicle_core::Grid;

/// Cost and water flag of one square
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostCell {
    /// Cost to enter this square
    pub cost: f32,
    /// Whether this square is water
    pub is_water: bool,
}

impl Default for CostCell {
    fn default() -> Self {
        Self {
            cost: 1.0,
            is_water: false,
        }
    }
}

/// A dense grid of movement costs, built once per step and shared by every
/// path search and movement resolution of that step
#[derive(Debug, Clone)]
pub struct CostGrid {
    width: u32,
    height: u32,
    cells: Vec<CostCell>,
}

impl CostGrid {
    /// Build from a closure over coordinates
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> CostCell) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    /// Build from a world grid; squares without terrain cost 1.0 on land
    pub fn from_world_grid(grid: &Grid) -> Self {
        Self::from_fn(grid.width(), grid.height(), |x, y| {
            match &grid.square(x, y).terrain {
                Some(terrain) => CostCell {
                    cost: terrain.cost as f32,
                    is_water: terrain.is_water,
                },
                None => CostCell::default(),
            }
        })
    }

    /// Grid width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of squares
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid is empty (it never is; dimensions clamp to 1x1)
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cell at clamped coordinates
    pub fn cell(&self, x: u32, y: u32) -> CostCell {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.cells[(y * self.width + x) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::Terrain;
    use std::sync::Arc;

    #[test]
    fn test_from_world_grid() {
        let mut grid = Grid::new(3, 2);
        grid.set_terrain(1, 0, Arc::new(Terrain::water("river", 2.0)));

        let costs = CostGrid::from_world_grid(&grid);
        assert_eq!(costs.cell(1, 0), CostCell { cost: 2.0, is_water: true });
        // untouched squares default to land cost 1
        assert_eq!(costs.cell(0, 1), CostCell::default());
        // out-of-range access clamps
        assert_eq!(costs.cell(9, 9), costs.cell(2, 1));
    }
}
