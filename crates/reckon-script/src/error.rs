//! Error types for reckon-script

use thiserror::Error;

/// Definition loading error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error(transparent)]
    Core(#[from] reckon_core::Error),

    #[error("Invalid definition '{id}': {reason}")]
    InvalidDefinition { id: String, reason: String },

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),
}

impl Error {
    pub(crate) fn invalid(id: &str, reason: impl Into<String>) -> Self {
        Error::InvalidDefinition {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
