use thiserror::Error;

/// Top-level error type for the Healthmate system.
///
/// Subsystem crates define their own error types and implement
/// `From<HealthmateError>` so that the `?` operator works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HealthmateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authorization error: {0}")]
    Auth(String),

    #[error("Voice capture error: {0}")]
    Voice(String),
}

impl From<toml::de::Error> for HealthmateError {
    fn from(err: toml::de::Error) -> Self {
        HealthmateError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HealthmateError {
    fn from(err: toml::ser::Error) -> Self {
        HealthmateError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for HealthmateError {
    fn from(err: serde_json::Error) -> Self {
        HealthmateError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Healthmate operations.
pub type Result<T> = std::result::Result<T, HealthmateError>;
