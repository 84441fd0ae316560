//! Common error types for Moodify

use thiserror::Error;

/// Common result type for Moodify operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Moodify services
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON document could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML document could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
