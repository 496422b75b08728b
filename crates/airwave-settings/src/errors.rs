//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading settings or the identity store.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read or write a file.
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    /// A file did not contain the JSON we expected.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A settings value was invalid (e.g., a non-WebSocket URL).
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
