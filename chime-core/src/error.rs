//! Error types for the chime engine.

use thiserror::Error;

/// Errors that can occur in chime operations.
#[derive(Error, Debug)]
pub enum ChimeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calendar source error: {0}")]
    Gateway(String),

    #[error("Calendar access denied: {0}")]
    Permission(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Alert not found: event {event_id} at {alert_time}")]
    AlertNotFound { event_id: i64, alert_time: i64 },

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for chime operations.
pub type ChimeResult<T> = Result<T, ChimeError>;
