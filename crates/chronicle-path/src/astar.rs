//! A* search over a cost grid with reusable search-state buffers
//!
//! The search runs once per moving entity per step across a large world, so
//! per-node open/closed state is tagged with a generation counter instead of
//! being reallocated; repeated searches on one [`Pathfinder`] reuse the same
//! buffers.

use crate::cost::CostGrid;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance estimate used to order the open list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    /// |dx| + |dy|
    Manhattan,
    /// Straight-line distance
    Euclidean,
    /// Squared straight-line distance (fast, inadmissible, greedy-leaning)
    EuclideanSq,
    /// max(|dx|, |dy|)
    MaxDelta,
    /// Octile distance: diagonal moves shortcut the smaller delta
    DiagonalShortcut,
}

impl Heuristic {
    fn estimate(self, dx: f32, dy: f32, diagonal_cost: f32) -> f32 {
        let dx = dx.abs();
        let dy = dy.abs();
        match self {
            Heuristic::Manhattan => dx + dy,
            Heuristic::Euclidean => (dx * dx + dy * dy).sqrt(),
            Heuristic::EuclideanSq => dx * dx + dy * dy,
            Heuristic::MaxDelta => dx.max(dy),
            Heuristic::DiagonalShortcut => dx.max(dy) + (diagonal_cost - 1.0) * dx.min(dy),
        }
    }
}

/// Search configuration
#[derive(Debug, Clone)]
pub struct PathOptions {
    /// Expand diagonal neighbors as well as the four cardinal ones
    pub diagonal: bool,
    /// Cost multiplier for diagonal steps
    pub diagonal_cost: f32,
    /// Heuristic used to order the open list
    pub heuristic: Heuristic,
    /// Perturb ties toward nodes colinear with the start-to-goal vector
    pub tie_break: bool,
    /// Cost multiplier for entering water squares
    pub water_cost_ratio: f32,
    /// Hard cap on node expansions; hitting it fails closed (no path)
    pub expansion_limit: usize,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            diagonal: false,
            diagonal_cost: std::f32::consts::SQRT_2,
            heuristic: Heuristic::Manhattan,
            tie_break: false,
            water_cost_ratio: 1.0,
            expansion_limit: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    index: u32,
    g: f32,
    f: f32,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.g == other.g
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap, we want the smallest f on top
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.g.total_cmp(&self.g))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A reusable A* searcher
///
/// Buffers are sized lazily to the grid and survive across calls; a
/// generation counter marks which entries belong to the current search.
#[derive(Debug, Default)]
pub struct Pathfinder {
    generation: u32,
    size: usize,
    width: u32,
    height: u32,
    touched: Vec<u32>,
    closed: Vec<u32>,
    g_score: Vec<f32>,
    parent: Vec<u32>,
    open: BinaryHeap<OpenNode>,
}

impl Pathfinder {
    /// Create a searcher with empty buffers
    pub fn new() -> Self {
        Self::default()
    }

    fn prepare(&mut self, grid: &CostGrid) {
        let size = grid.len();
        if self.size != size {
            self.size = size;
            self.touched = vec![0; size];
            self.closed = vec![0; size];
            self.g_score = vec![0.0; size];
            self.parent = vec![0; size];
            self.generation = 0;
        }
        self.width = grid.width();
        self.height = grid.height();
        if self.generation == u32::MAX {
            self.touched.fill(0);
            self.closed.fill(0);
            self.generation = 0;
        }
        self.generation += 1;
        self.open.clear();
    }

    fn index(&self, x: u32, y: u32) -> u32 {
        y * self.width + x
    }

    /// Find a path from `start` to `goal`
    ///
    /// The returned path excludes the starting square and is ordered
    /// start to end. Returns `None` when no path exists or the expansion
    /// limit is hit.
    pub fn find_path(
        &mut self,
        grid: &CostGrid,
        start: (u32, u32),
        goal: (u32, u32),
        options: &PathOptions,
    ) -> Option<Vec<(u32, u32)>> {
        self.prepare(grid);
        let generation = self.generation;

        let start_index = self.index(start.0.min(self.width - 1), start.1.min(self.height - 1));
        let goal = (goal.0.min(self.width - 1), goal.1.min(self.height - 1));
        let goal_index = self.index(goal.0, goal.1);

        let start_h = options.heuristic.estimate(
            goal.0 as f32 - start.0 as f32,
            goal.1 as f32 - start.1 as f32,
            options.diagonal_cost,
        );

        self.touched[start_index as usize] = generation;
        self.g_score[start_index as usize] = 0.0;
        self.parent[start_index as usize] = start_index;
        self.open.push(OpenNode {
            index: start_index,
            g: 0.0,
            f: start_h,
        });

        let neighbor_offsets: &[(i64, i64, bool)] = if options.diagonal {
            &[
                (1, 0, false),
                (-1, 0, false),
                (0, 1, false),
                (0, -1, false),
                (1, 1, true),
                (1, -1, true),
                (-1, 1, true),
                (-1, -1, true),
            ]
        } else {
            &[(1, 0, false), (-1, 0, false), (0, 1, false), (0, -1, false)]
        };

        let mut expanded = 0usize;
        while let Some(node) = self.open.pop() {
            let index = node.index as usize;
            if self.closed[index] == generation {
                continue;
            }
            if expanded >= options.expansion_limit {
                // fail closed rather than searching unbounded
                return None;
            }
            expanded += 1;
            self.closed[index] = generation;

            if node.index == goal_index {
                return Some(self.reconstruct(start_index, goal_index));
            }

            let x = node.index % self.width;
            let y = node.index / self.width;
            for &(dx, dy, is_diagonal) in neighbor_offsets {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                let neighbor_index = self.index(nx, ny);
                if self.closed[neighbor_index as usize] == generation {
                    continue;
                }

                let cell = grid.cell(nx, ny);
                let mut step_cost = cell.cost;
                if cell.is_water {
                    step_cost *= options.water_cost_ratio;
                }
                if is_diagonal {
                    step_cost *= options.diagonal_cost;
                }
                let tentative_g = node.g + step_cost;

                let untouched = self.touched[neighbor_index as usize] != generation;
                if untouched || tentative_g < self.g_score[neighbor_index as usize] {
                    self.touched[neighbor_index as usize] = generation;
                    self.g_score[neighbor_index as usize] = tentative_g;
                    self.parent[neighbor_index as usize] = node.index;

                    let mut h = options.heuristic.estimate(
                        goal.0 as f32 - nx as f32,
                        goal.1 as f32 - ny as f32,
                        options.diagonal_cost,
                    );
                    if options.tie_break {
                        // favor nodes colinear with the start-to-goal vector
                        let dx1 = nx as f32 - goal.0 as f32;
                        let dy1 = ny as f32 - goal.1 as f32;
                        let dx2 = start.0 as f32 - goal.0 as f32;
                        let dy2 = start.1 as f32 - goal.1 as f32;
                        h += (dx1 * dy2 - dx2 * dy1).abs() * 0.001;
                    }
                    self.open.push(OpenNode {
                        index: neighbor_index,
                        g: tentative_g,
                        f: tentative_g + h,
                    });
                }
            }
        }

        None
    }

    fn reconstruct(&self, start_index: u32, goal_index: u32) -> Vec<(u32, u32)> {
        let mut path = Vec::new();
        let mut current = goal_index;
        while current != start_index {
            path.push((current % self.width, current / self.width));
            current = self.parent[current as usize];
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostCell;

    fn open_grid(width: u32, height: u32) -> CostGrid {
        CostGrid::from_fn(width, height, |_, _| CostCell::default())
    }

    #[test]
    fn test_open_grid_manhattan_corner_to_corner() {
        let grid = open_grid(5, 5);
        let mut finder = Pathfinder::new();
        let path = finder
            .find_path(&grid, (0, 0), (4, 4), &PathOptions::default())
            .unwrap();
        // 4-directional path between opposite corners of a 5x5 grid
        assert_eq!(path.len(), 8);
        assert_eq!(path.last(), Some(&(4, 4)));
        assert!(!path.contains(&(0, 0)), "path must exclude the start");
    }

    #[test]
    fn test_expansion_limit_zero_fails_closed() {
        let grid = open_grid(5, 5);
        let mut finder = Pathfinder::new();
        let options = PathOptions {
            expansion_limit: 0,
            ..PathOptions::default()
        };
        assert_eq!(finder.find_path(&grid, (0, 0), (4, 4), &options), None);
    }

    #[test]
    fn test_diagonal_shortens_path() {
        let grid = open_grid(5, 5);
        let mut finder = Pathfinder::new();
        let options = PathOptions {
            diagonal: true,
            heuristic: Heuristic::DiagonalShortcut,
            ..PathOptions::default()
        };
        let path = finder.find_path(&grid, (0, 0), (4, 4), &options).unwrap();
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn test_search_routes_around_expensive_water() {
        // a vertical river at x=1, crossable but expensive
        let grid = CostGrid::from_fn(4, 3, |x, _| CostCell {
            cost: 1.0,
            is_water: x == 1,
        });
        let mut finder = Pathfinder::new();
        let options = PathOptions {
            water_cost_ratio: 10.0,
            ..PathOptions::default()
        };
        let path = finder.find_path(&grid, (0, 1), (3, 1), &options).unwrap();
        // the river must still be crossed exactly once
        let water_steps = path.iter().filter(|&&(x, _)| x == 1).count();
        assert_eq!(water_steps, 1);
        assert_eq!(path.last(), Some(&(3, 1)));
    }

    #[test]
    fn test_buffers_are_reused_across_searches() {
        let grid = open_grid(8, 8);
        let mut finder = Pathfinder::new();
        for _ in 0..100 {
            let path = finder
                .find_path(&grid, (0, 0), (7, 7), &PathOptions::default())
                .unwrap();
            assert_eq!(path.len(), 14);
        }
        assert_eq!(finder.generation, 100);
    }

    #[test]
    fn test_start_equals_goal() {
        let grid = open_grid(3, 3);
        let mut finder = Pathfinder::new();
        let path = finder
            .find_path(&grid, (1, 1), (1, 1), &PathOptions::default())
            .unwrap();
        assert!(path.is_empty());
    }
}
