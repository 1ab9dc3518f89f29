//! Identity types for things and definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a thing instance at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThingId(pub u64);

impl ThingId {
    /// Create a new thing ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thing:{}", self.0)
    }
}

/// Name of a definition loaded from scripts
///
/// Uses a string-based name for easy reference from RON definition files
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefName(pub String);

impl DefName {
    /// Create a new definition name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DefName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DefName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thing_id() {
        let id = ThingId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(format!("{}", id), "thing:42");
    }

    #[test]
    fn test_def_name() {
        let name = DefName::new("bandit_camp");
        assert_eq!(name.as_str(), "bandit_camp");
        assert_eq!(format!("{}", name), "bandit_camp");
    }
}
