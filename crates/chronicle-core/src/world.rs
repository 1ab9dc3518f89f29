//! World snapshots and the per-step event log

use crate::grid::Grid;
use crate::identity::{DefName, ThingId};
use crate::thing::Thing;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A record of one event that fired during a step
///
/// Immutable once appended to a world's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurredEvent {
    /// The event definition that fired
    pub event: DefName,
    /// The subject it fired for
    pub subject: ThingId,
    /// Resolved object roles, in declaration order
    pub objects: IndexMap<String, ThingId>,
    /// Index of the result that was applied, within the definition's list
    pub result: usize,
    /// Rendered description for the audit trail
    pub description: String,
}

/// An immutable snapshot of the simulated world at one step
///
/// Stepping never mutates a world in place; the engine builds each next
/// world from a structural clone of the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    /// The seed all per-entity randomness derives from
    pub seed: u64,
    /// Monotonic step counter
    pub step: u64,
    /// Spatial index of all things
    pub grid: Grid,
    /// Events that occurred while producing this snapshot
    pub occurred: Vec<OccurredEvent>,
}

impl World {
    /// Create a step-zero world over a grid
    pub fn new(seed: u64, grid: Grid) -> Self {
        Self {
            seed,
            step: 0,
            grid,
            occurred: Vec::new(),
        }
    }

    /// Find a thing by identity
    pub fn find_thing(&self, id: ThingId) -> Option<&Thing> {
        self.grid.find_thing(id)
    }
}
