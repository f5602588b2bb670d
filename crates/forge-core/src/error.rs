//! Error types for Forge

use thiserror::Error;

/// Main error type for Forge
///
/// Per-item failures during a turn (a package, a file, a command) are
/// recorded in the `ApplicationResult` instead of surfacing here.
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found in {0}")]
    ConfigNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("Environment {operation} failed: {message}")]
    Environment { operation: String, message: String },

    #[error("Model stream ended before completion")]
    StreamIncomplete,

    #[error("Model stream error: {0}")]
    StreamError(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ForgeError {
    /// Create an environment operation error
    pub fn environment(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Environment {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the environment handle itself is unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, ForgeError::EnvironmentUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
