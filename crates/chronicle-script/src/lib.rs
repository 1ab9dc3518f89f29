//! Chronicle Script - RON definition loading and static compilation
//!
//! Loads world content from RON files:
//! - Thing definitions with inheritance and expression-valued defaults
//! - Event definitions with conditions, chances, object roles and results
//!
//! and compiles every expression field eagerly into the shared cache,
//! producing the ready-to-call definition store the engine consumes.

mod compiled;
mod error;
mod factory;
mod loader;
mod schema;
mod store;

pub use compiled::{
    CompiledEffectDef, CompiledEventDef, CompiledField, CompiledMoveTarget, CompiledObjectDef,
    CompiledResultDef, CompiledSpawnDef, CompiledSpawnPosition, CompiledThingDef,
};
pub use error::{Error, Result};
pub use factory::{DefFactory, ThingFactory};
pub use loader::{Loader, RawDefs};
pub use schema::{
    EffectDef, EventDef, EventDefs, MoveDef, MoveTarget, ObjectDef, ResultDef, SpawnDef,
    SpawnPosition, SubjectDef, ThingDef, ThingDefs,
};
pub use store::DefinitionStore;
