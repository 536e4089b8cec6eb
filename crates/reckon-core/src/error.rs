//! Error types for reckon-core

use crate::parser::ParseError;
use crate::value::ValueKind;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Parse error in `{expression}`: {source}")]
    Parse {
        expression: String,
        source: ParseError,
    },

    #[error("Value with ID '{0}' not found in registry")]
    ValueNotFound(String),

    #[error("Value '{id}' is a {kind} and cannot be set directly")]
    NotSettable { id: String, kind: ValueKind },

    #[error("Registering '{id}' would create a dependency cycle through '{through}'")]
    CycleDetected { id: String, through: String },

    #[error("Value '{0}' depends on itself during evaluation")]
    EvaluationCycle(String),

    #[error("Cannot remove '{id}': {} other value(s) depend on it", .dependents.len())]
    HasDependents { id: String, dependents: Vec<String> },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
