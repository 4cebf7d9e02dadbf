//! Error types for signal-dbus
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in signal-dbus
#[derive(Debug, Error)]
pub enum SignalDbusError {
    /// Malformed settings, rejected before any transport call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bus-level failure, surfaced from the transport verbatim
    #[error("Transport error: {0}")]
    Transport(String),

    /// Operation not valid for the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SignalDbusError {
    /// Whether this error is fatal to client construction (never retried).
    pub fn is_configuration(&self) -> bool {
        matches!(self, SignalDbusError::Configuration(_))
    }
}

/// Result type alias for signal-dbus operations
pub type Result<T> = std::result::Result<T, SignalDbusError>;
