//! Error types for the radar library.
//!
//! Only configuration problems abort a run. Missing or unreadable history is
//! never surfaced through this type by the core; stores log and fall back to
//! empty state instead.

use thiserror::Error;

/// Result type alias using the radar's error type.
pub type Result<T> = std::result::Result<T, RadarError>;

#[derive(Error, Debug)]
pub enum RadarError {
    /// Taxonomy or runtime configuration is malformed. The run must abort.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Persisted state could not be written.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RadarError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<serde_json::Error> for RadarError {
    fn from(e: serde_json::Error) -> Self {
        RadarError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RadarError {
    fn from(e: toml::de::Error) -> Self {
        RadarError::Configuration(e.to_string())
    }
}
