//! Per-step staging of things
//!
//! During a step every touched thing gets exactly one [`StagedThing`]: a
//! freshly aged clone of its previous-step self, memoized by identity. All
//! mutation during the step happens on staged copies; the previous world is
//! never modified. Non-destroyed staged things are committed to the next
//! world's grid when the step completes.

use chronicle_core::{Thing, ThingId, World};
use indexmap::IndexMap;

/// One thing's working copy for the current step
#[derive(Debug)]
pub(crate) struct StagedThing {
    pub thing: Thing,
    pub destroyed: bool,
    pub created: bool,
}

/// The step-scoped map of staged things, keyed by identity
#[derive(Debug, Default)]
pub(crate) struct StagingArea {
    entries: IndexMap<ThingId, StagedThing>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this identity has been staged and flagged destroyed
    pub fn is_destroyed(&self, id: ThingId) -> bool {
        self.entries.get(&id).is_some_and(|s| s.destroyed)
    }

    /// Get the staged copy for an identity, staging an aged clone from the
    /// current world on first access
    ///
    /// Returns `None` for identities that exist neither in the staging area
    /// nor in the world.
    pub fn get_or_stage(&mut self, world: &World, id: ThingId, step: u64) -> Option<&mut StagedThing> {
        if !self.entries.contains_key(&id) {
            let thing = world.find_thing(id)?.age_for(step);
            self.entries.insert(
                id,
                StagedThing {
                    thing,
                    destroyed: false,
                    created: false,
                },
            );
        }
        self.entries.get_mut(&id)
    }

    /// Stage a freshly created thing; never marked destroyed on creation
    pub fn stage_created(&mut self, thing: Thing) {
        self.entries.insert(
            thing.id,
            StagedThing {
                thing,
                destroyed: false,
                created: true,
            },
        );
    }

    /// Read access to a staged thing, destroyed or not
    pub fn thing(&self, id: ThingId) -> Option<&Thing> {
        self.entries.get(&id).map(|s| &s.thing)
    }

    /// Read access to a staged thing that is still alive
    pub fn alive(&self, id: ThingId) -> Option<&Thing> {
        self.entries
            .get(&id)
            .filter(|s| !s.destroyed)
            .map(|s| &s.thing)
    }

    /// Mutable access to a staged thing that is still alive
    pub fn get_mut_alive(&mut self, id: ThingId) -> Option<&mut StagedThing> {
        self.entries.get_mut(&id).filter(|s| !s.destroyed)
    }

    /// Flag a staged thing destroyed; it is excluded from the next grid and
    /// processed no further this step
    pub fn destroy(&mut self, id: ThingId) -> bool {
        match self.entries.get_mut(&id) {
            Some(staged) => {
                staged.destroyed = true;
                true
            }
            None => false,
        }
    }

    /// All staged identities, in staging order
    pub fn ids(&self) -> Vec<ThingId> {
        self.entries.keys().copied().collect()
    }

    /// Consume the area, yielding the surviving things
    pub fn into_surviving(self) -> impl Iterator<Item = Thing> {
        self.entries
            .into_values()
            .filter(|s| !s.destroyed)
            .map(|s| s.thing)
    }
}
