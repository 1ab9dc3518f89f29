//! Chronicle Engine - the step function
//!
//! Advances an immutable [`chronicle_core::World`] snapshot one step at a
//! time: walks every entity in grid-scan order, discovers matching
//! data-defined events through the expression engine, applies effects,
//! spawns, destructions and movement directives against staged copies,
//! executes movement, and commits the survivors into the next snapshot.
//!
//! Determinism is the governing invariant: every random draw derives from
//! `(world seed, step, thing id, stage)`, so regenerating a step from the
//! same inputs reproduces it bit for bit.

mod engine;
mod staging;

pub use engine::HistoryEngine;
