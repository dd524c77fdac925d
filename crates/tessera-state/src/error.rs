use std::path::PathBuf;

/// Errors raised while loading a state, level or entity description.
#[derive(Debug, thiserror::Error)]
pub enum DescriptionError {
    #[error("description not found: {0}")]
    NotFound(String),

    #[error("I/O error reading '{0}': {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid JSON in '{0}': {1}")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("malformed {artifact} '{name}': {reason}")]
    Malformed {
        artifact: &'static str,
        name: String,
        reason: String,
    },

    #[error(transparent)]
    Map(#[from] MapError),
}

impl DescriptionError {
    pub(crate) fn malformed(artifact: &'static str, name: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            artifact,
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by tile-map backends.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("map '{0}' not found")]
    NotFound(String),

    #[error("failed to load map '{name}': {reason}")]
    Load { name: String, reason: String },
}

/// Errors raised by the state manager.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    #[error("no state registered under '{0}'")]
    NotFound(String),

    #[error("'{0}' is a reserved state name")]
    Reserved(String),
}

/// A binding entry that could not be parsed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid input binding '{event}': {reason}")]
pub struct InputError {
    pub event: String,
    pub reason: String,
}

impl InputError {
    pub(crate) fn new(event: &str, reason: impl Into<String>) -> Self {
        Self {
            event: event.to_owned(),
            reason: reason.into(),
        }
    }
}
