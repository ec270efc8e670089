//! Error types for `rlbuffer` core library.

use thiserror::Error;

/// Result type alias using `rlbuffer` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `rlbuffer` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A setting is outside the range the relay can run with
    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
