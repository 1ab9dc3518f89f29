//! Event definition schema

use chronicle_core::ThingKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn always() -> String {
    "true".to_string()
}

fn certain() -> String {
    "100".to_string()
}

fn permanent() -> String {
    "-1".to_string()
}

fn subject_role() -> Vec<String> {
    vec!["Subject".to_string()]
}

/// Definition of a data-driven event, loaded from RON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDef {
    /// Unique event name
    pub name: String,
    /// Who this event can happen to
    pub subject: SubjectDef,
    /// Whether the event may fire while the subject is mid-movement
    #[serde(default)]
    pub triggered_while_moving: bool,
    /// Chance expression, an integer 1..=100 compared against the per-entity
    /// minimum-chance threshold
    pub chance: String,
    /// Description template for the audit trail (FormattedText)
    #[serde(default)]
    pub description: String,
    /// Named object roles resolved from nearby things
    #[serde(default)]
    pub objects: IndexMap<String, ObjectDef>,
    /// Possible results; exactly one is applied per occurrence
    #[serde(default)]
    pub results: Vec<ResultDef>,
}

/// The subject filter of an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectDef {
    /// Required thing kind
    pub kind: ThingKind,
    /// Allowed subject definitions; empty means any. A subject matches if
    /// its inheritance chain contains one of these names.
    #[serde(default)]
    pub definitions: Vec<String>,
    /// Match condition over the subject
    #[serde(default = "always")]
    pub condition: String,
}

/// One named object role of an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDef {
    /// Required thing kind
    pub kind: ThingKind,
    /// Allowed definitions; empty means any
    #[serde(default)]
    pub definitions: Vec<String>,
    /// Search radius in grid squares around the subject
    pub distance: u32,
    /// Whether the event may fire with this role unresolved
    #[serde(default)]
    pub optional: bool,
    /// Match condition; bound names are Subject, the roles resolved so far,
    /// and this role's own name for the candidate under test
    #[serde(default = "always")]
    pub condition: String,
}

/// One possible result of an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDef {
    /// Chance expression compared against a fresh threshold per occurrence
    #[serde(default = "certain")]
    pub chance: String,
    /// Fallback result applied when no shuffled result passes its chance
    #[serde(default)]
    pub default: bool,
    /// Timed attribute modifiers to apply
    #[serde(default)]
    pub effects: Vec<EffectDef>,
    /// New things to create
    #[serde(default)]
    pub spawns: Vec<SpawnDef>,
    /// Roles to destroy
    #[serde(default)]
    pub destroys: Vec<String>,
    /// Movement directives for the subject
    #[serde(default)]
    pub moves: Vec<MoveDef>,
}

/// A timed attribute modifier produced by a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDef {
    /// Audit-trail title (FormattedText)
    #[serde(default)]
    pub title: String,
    /// Audit-trail description (FormattedText)
    #[serde(default)]
    pub description: String,
    /// Target attribute name (FormattedText)
    pub attribute: String,
    /// Signed magnitude expression
    pub magnitude: String,
    /// Duration in steps as an expression; "-1" means permanent
    #[serde(default = "permanent")]
    pub duration: String,
    /// Role names to apply the effect to; "Subject" is the literal subject
    #[serde(default = "subject_role")]
    pub applied_to: Vec<String>,
}

/// Where a spawned thing is placed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SpawnPosition {
    /// Fixed coordinates
    Absolute { x: String, y: String },
    /// Offset from the subject's position
    RelativeToSubject { dx: String, dy: String },
}

/// A new thing created by a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnDef {
    /// Definition name template for the new thing (FormattedText)
    pub definition: String,
    /// Placement
    pub position: SpawnPosition,
    /// Base attribute overrides applied after creation
    #[serde(default)]
    pub attribute_overrides: Vec<(String, String)>,
}

/// What a movement directive points at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MoveTarget {
    /// Fixed destination coordinates
    Coords { x: String, y: String },
    /// Follow a resolved role's thing
    Role(String),
}

/// A movement directive; sets the subject's move state, movement itself is
/// executed by the movement engine after all events are applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveDef {
    pub target: MoveTarget,
}

/// A collection of event definitions, the top-level shape of an events file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventDefs {
    pub events: Vec<EventDef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_def_from_ron() {
        let source = r#"
        (
            name: "bandit_raid",
            subject: (kind: Site, condition: "Subject->Population > 20"),
            chance: "25",
            description: "Bandits raided the settlement",
            objects: {
                "Raiders": (kind: Unit, distance: 3, definitions: ["bandits"]),
            },
            results: [
                (
                    default: true,
                    effects: [(
                        title: "Raided",
                        attribute: "Population",
                        magnitude: "-rand(5, 15)",
                        duration: "4",
                    )],
                ),
            ],
        )
        "#;
        let def: EventDef = ron::from_str(source).unwrap();
        assert_eq!(def.name, "bandit_raid");
        assert_eq!(def.subject.kind, ThingKind::Site);
        assert!(!def.triggered_while_moving);
        assert_eq!(def.objects.len(), 1);
        assert_eq!(def.objects["Raiders"].distance, 3);
        assert!(!def.objects["Raiders"].optional);
        // defaults
        assert_eq!(def.objects["Raiders"].condition, "true");
        assert_eq!(def.results[0].chance, "100");
        assert_eq!(def.results[0].effects[0].applied_to, vec!["Subject"]);
        assert_eq!(def.results[0].effects[0].duration, "4");
    }
}
