//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum CoreError {
    /// IO error (config file, directory creation)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path resolution error
    #[error("Path error: {0}")]
    Path(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
