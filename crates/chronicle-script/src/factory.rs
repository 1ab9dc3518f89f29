//! The thing factory: creates things from their definitions

use crate::error::{Error, Result};
use crate::store::DefinitionStore;
use chronicle_core::{EvalScope, SimRng, Thing, ThingId, ValueMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Creates things from definitions, seeding base attributes from the
/// resolved inheritance chain
pub trait ThingFactory {
    /// Create a new thing of the named definition at a position
    fn create(
        &self,
        rng: &mut SimRng,
        step: u64,
        globals: &ValueMap,
        x: u32,
        y: u32,
        definition: &str,
    ) -> Result<Thing>;
}

/// The standard factory over a definition store
///
/// Identities are sequential and process-ordered; with single-threaded
/// stepping this is deterministic.
pub struct DefFactory<'a> {
    store: &'a DefinitionStore,
    next_id: AtomicU64,
}

impl<'a> DefFactory<'a> {
    /// Create a factory whose first issued id is 1
    pub fn new(store: &'a DefinitionStore) -> Self {
        Self::starting_at(store, 1)
    }

    /// Create a factory with an explicit first id, for resuming a world
    /// whose ids are already partly allocated
    pub fn starting_at(store: &'a DefinitionStore, first_id: u64) -> Self {
        Self {
            store,
            next_id: AtomicU64::new(first_id),
        }
    }
}

impl ThingFactory for DefFactory<'_> {
    fn create(
        &self,
        rng: &mut SimRng,
        step: u64,
        globals: &ValueMap,
        x: u32,
        y: u32,
        definition: &str,
    ) -> Result<Thing> {
        let leaf = self
            .store
            .thing_def(definition)
            .ok_or_else(|| Error::UnknownDefinition(definition.to_string()))?;

        let id = ThingId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut thing = Thing::new(id, leaf.kind, definition, x, y);

        // base-first down the chain so children override parents
        let chain = self.store.inherited_names(definition);
        for name in chain.iter().rev() {
            if let Some(def) = self.store.thing_def(name) {
                for (attribute, expr) in &def.attributes {
                    let mut scope = EvalScope::new(rng, step, globals);
                    let value = expr.eval_int(&mut scope)?;
                    thing.set_attribute(attribute.clone(), value);
                }
            }
        }

        Ok(thing)
    }
}
