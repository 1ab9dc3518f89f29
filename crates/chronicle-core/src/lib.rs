//! Chronicle Core - primitives for the deterministic history engine
//!
//! This crate provides the leaf types every other chronicle crate builds on:
//! - Dynamic value types (`Value`, `ValueMap`)
//! - Thing and definition identifiers
//! - A textual expression engine with a process-wide compilation cache
//! - Deterministic per-entity RNG derivation
//! - The Thing/Effect data model
//! - The Grid spatial index and immutable World snapshots

mod error;
pub mod expr;
mod grid;
mod identity;
mod rng;
mod thing;
mod value;
mod world;

pub use error::{CompileError, EvalError};
pub use expr::{compile, compile_cached, CompiledExpr, EvalScope, ExprMode};
pub use grid::{Grid, GridSquare, Terrain};
pub use identity::{DefName, ThingId};
pub use rng::{SimRng, Stage};
pub use thing::{AttributeEffect, MoveState, Thing, ThingKind};
pub use value::{Value, ValueMap};
pub use world::{OccurredEvent, World};
