//! Definition schemas loaded from RON files

pub mod event;
pub mod thing;

pub use event::{
    EventDef, EventDefs, EffectDef, MoveDef, MoveTarget, ObjectDef, ResultDef, SpawnDef,
    SpawnPosition, SubjectDef,
};
pub use thing::{ThingDef, ThingDefs};
