//! Error types for chronicle-script
//!
//! Expression failures are wrapped with the owning definition's name and the
//! failing field so a bad chance or condition is attributable without a
//! stack trace into the expression engine.

use chronicle_core::{CompileError, EvalError};
use thiserror::Error;

/// Definition loading and evaluation error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    #[error("Unknown definition: {0}")]
    UnknownDefinition(String),

    #[error("Inheritance cycle through: {0}")]
    InheritanceCycle(String),

    #[error("{definition}.{field}: {source}")]
    Compile {
        definition: String,
        field: String,
        #[source]
        source: CompileError,
    },

    #[error("{definition}.{field}: {source}")]
    Eval {
        definition: String,
        field: String,
        #[source]
        source: EvalError,
    },
}

impl Error {
    pub(crate) fn compile(definition: &str, field: &str, source: CompileError) -> Self {
        Error::Compile {
            definition: definition.to_string(),
            field: field.to_string(),
            source,
        }
    }

    pub(crate) fn eval(definition: &str, field: &str, source: EvalError) -> Self {
        Error::Eval {
            definition: definition.to_string(),
            field: field.to_string(),
            source,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
