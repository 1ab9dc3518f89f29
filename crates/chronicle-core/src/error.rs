//! Error types for chronicle-core
//!
//! Compile-time and evaluation-time failures are distinct types so that
//! callers can treat malformed expressions as fatal at definition-load time
//! while containing runtime evaluation failures per event.

use thiserror::Error;

/// A failure to compile an expression source text
#[derive(Error, Debug, Clone)]
#[error("compile error at offset {offset}: {message}")]
pub struct CompileError {
    /// Byte offset into the (rewritten) source where the error was noticed
    pub offset: usize,
    /// Human-readable description
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// A failure while evaluating a compiled expression
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    #[error("type error: expected {expected}, got {got}")]
    Type {
        expected: &'static str,
        got: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), got {got}")]
    Arity {
        function: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("attribute access on a value that is not a bound thing")]
    NotAThing,
}

impl EvalError {
    pub(crate) fn type_error(expected: &'static str, got: &'static str) -> Self {
        EvalError::Type { expected, got }
    }
}
