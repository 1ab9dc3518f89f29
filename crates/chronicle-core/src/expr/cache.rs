//! Process-wide compilation cache
//!
//! Compilation is expensive relative to evaluation, and identical expression
//! sources appear across many definitions. Artifacts are cached globally,
//! keyed by `(source text, mode)`, and never invalidated. Insertion is
//! idempotent: compilation is a pure function of the key, so a racing
//! recompile produces an equivalent artifact and the first insert wins.

use crate::error::CompileError;
use crate::expr::{compile, CompiledExpr, ExprMode};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

type Cache = RwLock<HashMap<(String, ExprMode), Arc<CompiledExpr>>>;

static CACHE: OnceLock<Cache> = OnceLock::new();

fn cache() -> &'static Cache {
    CACHE.get_or_init(Default::default)
}

/// Compile through the process-wide cache
///
/// Returns the shared artifact for this exact source text; all definitions
/// using an identical expression share one compiled handle.
pub fn compile_cached(
    source: &str,
    declared: &[&str],
    mode: ExprMode,
) -> Result<Arc<CompiledExpr>, CompileError> {
    {
        let guard = cache().read().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(hit) = guard.get(&(source.to_string(), mode)) {
            return Ok(hit.clone());
        }
    }

    let compiled = Arc::new(compile(source, declared, mode)?);

    let mut guard = cache().write().unwrap_or_else(|poisoned| poisoned.into_inner());
    Ok(guard
        .entry((source.to_string(), mode))
        .or_insert(compiled)
        .clone())
}
