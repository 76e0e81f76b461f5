//! Error handling for archsetup
//!
//! Centralized error types using thiserror. The library modules return
//! `SetupError`; the orchestration layers wrap it with `anyhow` context.

use thiserror::Error;

/// Main error type for archsetup
#[derive(Error, Debug)]
pub enum SetupError {
    /// IO errors (file operations, spawning processes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A system utility exited non-zero or could not be spawned
    #[error("Command failed: {0}")]
    Command(String),

    /// Validation errors (user input, config values)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Handoff state errors (missing or malformed state files)
    #[error("State error: {0}")]
    State(String),

    /// Configuration errors (loading, parsing, override values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for archsetup operations
pub type Result<T> = std::result::Result<T, SetupError>;

impl SetupError {
    /// Create a command error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
