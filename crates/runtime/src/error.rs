//! Runtime errors

use thiserror::Error;

use banter_artifact::ValueType;

/// Runtime result type
pub type Result<T> = std::result::Result<T, Error>;

/// Faults that end a dialogue session.
///
/// Artifacts produced by the compiler cannot trigger most of these;
/// they exist so hand-edited or truncated artifacts fail with an error
/// instead of a panic.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown section: {0}")]
    UnknownSection(String),

    #[error("unknown node '{node}' in section '{section}'")]
    UnknownNode { section: String, node: String },

    #[error("no running session; call enter first")]
    NoSession,

    #[error("current node is not a choice")]
    NotAChoice,

    #[error("option index {index} out of range ({len} options)")]
    InvalidOption { index: usize, len: usize },

    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("type mismatch for '{name}': expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        got: ValueType,
    },

    #[error("cannot parse '{raw}' as {expected} for variable '{name}'")]
    BadValue {
        name: String,
        expected: ValueType,
        raw: String,
    },

    #[error("cannot evaluate: {0}")]
    Eval(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("no suspension after {0} steps; the dialogue graph loops")]
    TooManyIterations(usize),

    #[error("malformed node: {0}")]
    BadNode(String),

    #[error("invalid environment file: {0}")]
    Json(#[from] serde_json::Error),
}
