//! RON definition loader

use crate::error::{Error, Result};
use crate::schema::{EventDef, EventDefs, ThingDef, ThingDefs};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

/// RON parse options with the implicit-`Some` extension enabled, matching the
/// dialect used throughout the definition files (e.g. `max_events: "1"` for an
/// `Option<String>` field rather than `Some("1")`).
fn ron_options() -> ron::Options {
    ron::Options::default()
        .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
}

/// Raw definitions as loaded, before expression compilation
#[derive(Debug, Default)]
pub struct RawDefs {
    /// Thing definitions by name
    pub things: IndexMap<String, ThingDef>,
    /// Event definitions by name
    pub events: IndexMap<String, EventDef>,
}

/// Loader for RON definition files
pub struct Loader {
    defs: RawDefs,
}

impl Loader {
    /// Create a new loader
    pub fn new() -> Self {
        Self {
            defs: RawDefs::default(),
        }
    }

    /// Load a single RON file, sniffing its shape from name or content
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        if filename.contains("thing") || content.contains("things:") {
            self.load_things_str(&content)
        } else if filename.contains("event") || content.contains("events:") {
            self.load_events_str(&content)
        } else {
            // try each format in turn
            if self.load_things_str(&content).is_ok() {
                return Ok(());
            }
            self.load_events_str(&content)
        }
    }

    /// Load thing definitions from a RON string
    pub fn load_things_str(&mut self, content: &str) -> Result<()> {
        let file: ThingDefs = ron_options().from_str(content)?;
        for thing in file.things {
            if self.defs.things.contains_key(&thing.name) {
                return Err(Error::DuplicateDefinition(thing.name));
            }
            self.defs.things.insert(thing.name.clone(), thing);
        }
        Ok(())
    }

    /// Load event definitions from a RON string
    pub fn load_events_str(&mut self, content: &str) -> Result<()> {
        let file: EventDefs = ron_options().from_str(content)?;
        for event in file.events {
            if self.defs.events.contains_key(&event.name) {
                return Err(Error::DuplicateDefinition(event.name));
            }
            self.defs.events.insert(event.name.clone(), event);
        }
        Ok(())
    }

    /// Load all RON files from a directory, recursively
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not a directory: {:?}", path),
            )));
        }

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();

            if file_path.extension().map(|e| e == "ron").unwrap_or(false) {
                self.load_file(&file_path)?;
            } else if file_path.is_dir() {
                self.load_directory(&file_path)?;
            }
        }

        Ok(())
    }

    /// Finish loading and return the raw definitions
    pub fn finish(self) -> RawDefs {
        self.defs
    }

    /// The definitions loaded so far
    pub fn defs(&self) -> &RawDefs {
        &self.defs
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_things() {
        let content = r#"
        (
            things: [
                (
                    name: "village",
                    kind: Site,
                    default_attributes: [("Population", "100"), ("Wealth", "rand(5, 20)")],
                ),
                (
                    name: "bandits",
                    kind: Unit,
                    land_speed: "3",
                    water_speed: "1",
                ),
            ]
        )
        "#;

        let mut loader = Loader::new();
        loader.load_things_str(content).unwrap();

        let defs = loader.finish();
        assert!(defs.things.contains_key("village"));
        assert_eq!(defs.things["bandits"].land_speed.as_deref(), Some("3"));
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let content = r#"(things: [(name: "village", kind: Site)])"#;
        let mut loader = Loader::new();
        loader.load_things_str(content).unwrap();
        let result = loader.load_things_str(content);
        assert!(matches!(result, Err(Error::DuplicateDefinition(_))));
    }

    #[test]
    fn test_load_events() {
        let content = r#"
        (
            events: [
                (
                    name: "plague",
                    subject: (kind: Site, condition: "Subject->Population > 10"),
                    chance: "5",
                ),
            ]
        )
        "#;
        let mut loader = Loader::new();
        loader.load_events_str(content).unwrap();
        assert_eq!(loader.defs().events.len(), 1);
    }
}
