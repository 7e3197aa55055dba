//! Error types for Treasure

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Blocking task failed to complete
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// API error
    #[error("API error: {0}")]
    Api(String),
}

/// Result type alias for Core operations
pub type Result<T> = std::result::Result<T, CoreError>;
