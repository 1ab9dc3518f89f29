//! The definition store: compiled definitions, inheritance chains and
//! by-subject-kind event grouping

use crate::compiled::{CompiledEventDef, CompiledThingDef};
use crate::error::{Error, Result};
use crate::loader::RawDefs;
use chronicle_core::ThingKind;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// All compiled definitions, ready for the engine
#[derive(Debug, Default)]
pub struct DefinitionStore {
    things: IndexMap<String, Arc<CompiledThingDef>>,
    events: Vec<Arc<CompiledEventDef>>,
    by_subject: HashMap<ThingKind, Vec<Arc<CompiledEventDef>>>,
    chains: HashMap<String, Vec<String>>,
    no_events: Vec<Arc<CompiledEventDef>>,
    no_chain: Vec<String>,
}

impl DefinitionStore {
    /// Compile raw definitions into a store
    ///
    /// Malformed expressions are fatal here; nothing else in the system
    /// compiles at runtime.
    pub fn compile(raw: &RawDefs) -> Result<Self> {
        let mut things = IndexMap::with_capacity(raw.things.len());
        for (name, def) in &raw.things {
            things.insert(name.clone(), Arc::new(CompiledThingDef::compile(def)?));
        }

        let mut chains = HashMap::with_capacity(things.len());
        for name in things.keys() {
            chains.insert(name.clone(), resolve_chain(name, &things)?);
        }

        let mut events = Vec::with_capacity(raw.events.len());
        let mut by_subject: HashMap<ThingKind, Vec<Arc<CompiledEventDef>>> = HashMap::new();
        for def in raw.events.values() {
            let compiled = Arc::new(CompiledEventDef::compile(def)?);
            by_subject
                .entry(compiled.subject_kind)
                .or_default()
                .push(compiled.clone());
            events.push(compiled);
        }

        tracing::debug!(
            things = things.len(),
            events = events.len(),
            "compiled definition store"
        );

        Ok(Self {
            things,
            events,
            by_subject,
            chains,
            no_events: Vec::new(),
            no_chain: Vec::new(),
        })
    }

    /// Look up a compiled thing definition by name
    pub fn thing_def(&self, name: &str) -> Option<&Arc<CompiledThingDef>> {
        self.things.get(name)
    }

    /// All compiled event definitions
    pub fn events(&self) -> &[Arc<CompiledEventDef>] {
        &self.events
    }

    /// The events whose subject kind matches, for O(1) per-entity lookup
    pub fn events_for_subject(&self, kind: ThingKind) -> &[Arc<CompiledEventDef>] {
        self.by_subject
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&self.no_events)
    }

    /// The inheritance chain of a definition, self first, root last
    pub fn inherited_names(&self, name: &str) -> &[String] {
        self.chains
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&self.no_chain)
    }

    /// Whether a definition's inheritance chain contains one of `allowed`
    ///
    /// An empty allow-list matches everything.
    pub fn definition_matches(&self, name: &str, allowed: &[String]) -> bool {
        if allowed.is_empty() {
            return true;
        }
        self.inherited_names(name)
            .iter()
            .any(|inherited| allowed.iter().any(|a| a == inherited))
    }
}

fn resolve_chain(
    name: &str,
    things: &IndexMap<String, Arc<CompiledThingDef>>,
) -> Result<Vec<String>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = name.to_string();
    loop {
        if !seen.insert(current.clone()) {
            return Err(Error::InheritanceCycle(current));
        }
        let def = things
            .get(&current)
            .ok_or_else(|| Error::UnknownDefinition(current.clone()))?;
        chain.push(current.clone());
        match &def.extends {
            Some(parent) => current = parent.clone(),
            None => break,
        }
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Loader;

    fn store_from(things: &str, events: &str) -> Result<DefinitionStore> {
        let mut loader = Loader::new();
        if !things.is_empty() {
            loader.load_things_str(things)?;
        }
        if !events.is_empty() {
            loader.load_events_str(events)?;
        }
        DefinitionStore::compile(&loader.finish())
    }

    #[test]
    fn test_inheritance_chain() {
        let store = store_from(
            r#"(things: [
                (name: "settlement", kind: Site),
                (name: "village", kind: Site, extends: "settlement"),
                (name: "fishing_village", kind: Site, extends: "village"),
            ])"#,
            "",
        )
        .unwrap();

        assert_eq!(
            store.inherited_names("fishing_village"),
            ["fishing_village", "village", "settlement"]
        );
        assert!(store.definition_matches("fishing_village", &["settlement".to_string()]));
        assert!(!store.definition_matches("settlement", &["village".to_string()]));
        // empty allow-list matches everything
        assert!(store.definition_matches("settlement", &[]));
    }

    #[test]
    fn test_inheritance_cycle_is_fatal() {
        let result = store_from(
            r#"(things: [
                (name: "a", kind: Site, extends: "b"),
                (name: "b", kind: Site, extends: "a"),
            ])"#,
            "",
        );
        assert!(matches!(result, Err(Error::InheritanceCycle(_))));
    }

    #[test]
    fn test_unknown_parent_is_fatal() {
        let result = store_from(r#"(things: [(name: "a", kind: Site, extends: "ghost")])"#, "");
        assert!(matches!(result, Err(Error::UnknownDefinition(_))));
    }

    #[test]
    fn test_events_grouped_by_subject_kind() {
        let store = store_from(
            r#"(things: [(name: "village", kind: Site)])"#,
            r#"(events: [
                (name: "plague", subject: (kind: Site), chance: "10"),
                (name: "festival", subject: (kind: Site), chance: "20"),
                (name: "desertion", subject: (kind: Unit), chance: "5"),
            ])"#,
        )
        .unwrap();

        assert_eq!(store.events_for_subject(ThingKind::Site).len(), 2);
        assert_eq!(store.events_for_subject(ThingKind::Unit).len(), 1);
        assert!(store.events_for_subject(ThingKind::Quest).is_empty());
    }
}
