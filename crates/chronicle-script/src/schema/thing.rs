//! Thing definition schema

use chronicle_core::ThingKind;
use serde::{Deserialize, Serialize};

/// Definition of a thing type, loaded from RON
///
/// Every expression-bearing field is a source string compiled by the
/// definition store; nothing here is evaluated at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThingDef {
    /// Unique definition name
    pub name: String,
    /// The variant tag things of this definition are created with
    pub kind: ThingKind,
    /// Parent definition (for inheritance)
    #[serde(default)]
    pub extends: Option<String>,
    /// Base attribute defaults: (attribute name, value expression)
    #[serde(default)]
    pub default_attributes: Vec<(String, String)>,
    /// Maximum events per step, as an expression; defaults to "1"
    #[serde(default)]
    pub max_events: Option<String>,
    /// Land movement budget per step, as an expression (movers only)
    #[serde(default)]
    pub land_speed: Option<String>,
    /// Water movement budget per step, as an expression (movers only)
    #[serde(default)]
    pub water_speed: Option<String>,
    /// Whether things of this definition fly, as an expression
    #[serde(default)]
    pub can_fly: Option<String>,
}

/// A collection of thing definitions, the top-level shape of a things file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ThingDefs {
    pub things: Vec<ThingDef>,
}

impl ThingDef {
    /// Create a minimal definition
    pub fn new(name: impl Into<String>, kind: ThingKind) -> Self {
        Self {
            name: name.into(),
            kind,
            extends: None,
            default_attributes: Vec::new(),
            max_events: None,
            land_speed: None,
            water_speed: None,
            can_fly: None,
        }
    }

    /// Add an attribute default
    pub fn with_attribute(mut self, name: impl Into<String>, expr: impl Into<String>) -> Self {
        self.default_attributes.push((name.into(), expr.into()));
        self
    }

    /// Set the parent definition
    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thing_def_builder() {
        let def = ThingDef::new("village", ThingKind::Site)
            .with_attribute("Population", "rand(50, 150)")
            .with_attribute("Wealth", "10");
        assert_eq!(def.name, "village");
        assert_eq!(def.default_attributes.len(), 2);
    }
}
