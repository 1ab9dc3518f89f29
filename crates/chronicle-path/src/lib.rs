//! Chronicle Path - movement and pathfinding over the world grid
//!
//! Two layers:
//! - [`Pathfinder`], a buffered A* search over a [`CostGrid`] with pluggable
//!   heuristics, optional diagonals and a hard expansion limit
//! - [`resolve_movement`], the per-step greedy walk that spends an entity's
//!   movement budget square by square with land/water cost differentiation

mod astar;
mod cost;
mod movement;

pub use astar::{Heuristic, PathOptions, Pathfinder};
pub use cost::{CostCell, CostGrid};
pub use movement::{resolve_movement, MoveOutcome, MoverProfile};
