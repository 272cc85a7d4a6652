//! Error types for the quit_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for quit_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The table store could not complete a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored table does not have the expected columns
    #[error("Schema mismatch: {0}")]
    Schema(String),

    /// Caller-supplied input was rejected before anything was written
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
