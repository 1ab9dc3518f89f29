//! The Thing data model: simulated entities and their timed effects

use crate::identity::{DefName, ThingId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The variant tag of a thing
///
/// Replaces the deep inheritance hierarchy of the reference design with a
/// flat tag over a shared core record; capabilities dispatch on the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThingKind {
    /// A generic entity with no special capabilities
    Generic,
    /// A mobile military or worker unit
    Unit,
    /// A named person able to travel and enter sites
    NotablePerson,
    /// A fixed location other things can be inside of
    Site,
    /// An ongoing quest; bookkeeping only, no physical footprint
    Quest,
    /// The terrain-bearing square itself
    WorldSquare,
}

impl ThingKind {
    /// Whether things of this kind can move across the grid
    pub fn is_moving(self) -> bool {
        matches!(self, ThingKind::Unit | ThingKind::NotablePerson)
    }

    /// Whether things of this kind can be inside a site
    pub fn can_enter_sites(self) -> bool {
        matches!(self, ThingKind::Unit | ThingKind::NotablePerson)
    }

    /// Whether things of this kind occupy a grid square
    pub fn has_position(self) -> bool {
        !matches!(self, ThingKind::Quest)
    }
}

/// Where a thing is currently headed, if anywhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MoveState {
    /// Not moving
    #[default]
    Idle,
    /// Moving toward fixed coordinates
    ToCoords { x: u32, y: u32 },
    /// Moving toward another thing's live position
    ToThing(ThingId),
}

impl MoveState {
    /// Check if no movement is in progress
    pub fn is_idle(&self) -> bool {
        matches!(self, MoveState::Idle)
    }
}

/// A timed modifier on one attribute of one thing
///
/// Created only by event results; never mutated after creation. Expiry is
/// decided by [`AttributeEffect::is_active_at`]; expired entries are pruned
/// when the owning thing is aged into the next step's staged copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeEffect {
    /// Short label for the audit trail
    pub title: String,
    /// Longer description for the audit trail
    pub description: String,
    /// Name of the attribute this effect modifies
    pub attribute: String,
    /// Signed magnitude added to the base value while active
    pub magnitude: i64,
    /// The step on which the effect took effect
    pub took_effect: u64,
    /// Number of steps the effect lasts; -1 means permanent
    pub duration: i64,
    /// The thing that applied this effect, when known
    pub applied_by: Option<ThingId>,
}

impl AttributeEffect {
    /// Whether this effect still applies at the given step
    pub fn is_active_at(&self, step: u64) -> bool {
        self.duration == -1 || (step.saturating_sub(self.took_effect) as i64) < self.duration
    }
}

/// A simulated entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    /// Stable unique identity
    pub id: ThingId,
    /// Variant tag
    pub kind: ThingKind,
    /// The definition this thing was created from
    pub definition: DefName,
    /// Display name
    pub name: String,
    /// Grid position
    pub x: u32,
    /// Grid position
    pub y: u32,
    /// Mutable base attribute values
    pub attributes: IndexMap<String, i64>,
    /// Time-bounded modifiers on attributes
    pub effects: Vec<AttributeEffect>,
    /// Current movement directive
    pub movement: MoveState,
    /// Movement budget carried over from the previous step
    pub residual_movement: f64,
    /// The site this thing is currently inside, if any
    pub inside: Option<ThingId>,
}

impl Thing {
    /// Create a new thing at a position
    pub fn new(id: ThingId, kind: ThingKind, definition: impl Into<DefName>, x: u32, y: u32) -> Self {
        let definition = definition.into();
        Self {
            id,
            kind,
            name: definition.as_str().to_string(),
            definition,
            x,
            y,
            attributes: IndexMap::new(),
            effects: Vec::new(),
            movement: MoveState::Idle,
            residual_movement: 0.0,
            inside: None,
        }
    }

    /// Get a base attribute value, defaulting to 0
    pub fn base_attribute(&self, name: &str) -> i64 {
        self.attributes.get(name).copied().unwrap_or(0)
    }

    /// Set a base attribute value
    pub fn set_attribute(&mut self, name: impl Into<String>, value: i64) {
        self.attributes.insert(name.into(), value);
    }

    /// The effective attribute value at a step: base plus the magnitudes of
    /// all effects on that attribute still active at the step
    pub fn effective_attribute(&self, name: &str, step: u64) -> i64 {
        let base = self.base_attribute(name);
        let modifier: i64 = self
            .effects
            .iter()
            .filter(|e| e.attribute == name && e.is_active_at(step))
            .map(|e| e.magnitude)
            .sum();
        base + modifier
    }

    /// Append a timed effect
    pub fn add_effect(&mut self, effect: AttributeEffect) {
        self.effects.push(effect);
    }

    /// Iterate the effects still active at a step
    pub fn active_effects(&self, step: u64) -> impl Iterator<Item = &AttributeEffect> {
        self.effects.iter().filter(move |e| e.is_active_at(step))
    }

    /// Structural copy of this thing aged to the given step
    ///
    /// Effects already expired at `step` are pruned from the copy; the
    /// original is left untouched. This is how a thing from one world
    /// snapshot enters the next step's staging area.
    pub fn age_for(&self, step: u64) -> Thing {
        let mut aged = self.clone();
        aged.effects.retain(|e| e.is_active_at(step));
        aged
    }

    /// Current grid position
    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    /// Move this thing to a grid position
    pub fn set_position(&mut self, x: u32, y: u32) {
        self.x = x;
        self.y = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effect(attribute: &str, magnitude: i64, took_effect: u64, duration: i64) -> AttributeEffect {
        AttributeEffect {
            title: "t".into(),
            description: "d".into(),
            attribute: attribute.into(),
            magnitude,
            took_effect,
            duration,
            applied_by: None,
        }
    }

    #[test]
    fn test_effective_attribute() {
        let mut thing = Thing::new(ThingId::new(1), ThingKind::Site, "village", 0, 0);
        thing.set_attribute("Population", 100);
        thing.add_effect(effect("Population", -5, 1, 3));
        thing.add_effect(effect("Population", 10, 1, -1));

        // both active
        assert_eq!(thing.effective_attribute("Population", 1), 105);
        assert_eq!(thing.effective_attribute("Population", 3), 105);
        // timed one expired at step 4 (4 - 1 >= 3), permanent remains
        assert_eq!(thing.effective_attribute("Population", 4), 110);
        // unknown attribute defaults to base 0
        assert_eq!(thing.effective_attribute("Wealth", 1), 0);
    }

    #[test]
    fn test_aging_prunes_expired_effects() {
        let mut thing = Thing::new(ThingId::new(1), ThingKind::Unit, "warband", 0, 0);
        thing.add_effect(effect("Strength", 2, 0, 2));
        thing.add_effect(effect("Strength", 7, 0, -1));

        let aged = thing.age_for(5);
        assert_eq!(aged.effects.len(), 1);
        assert_eq!(aged.effects[0].magnitude, 7);
        // original untouched
        assert_eq!(thing.effects.len(), 2);
    }

    #[test]
    fn test_capabilities() {
        assert!(ThingKind::Unit.is_moving());
        assert!(ThingKind::NotablePerson.can_enter_sites());
        assert!(!ThingKind::Site.is_moving());
        assert!(!ThingKind::Quest.has_position());
        assert!(ThingKind::WorldSquare.has_position());
    }
}
