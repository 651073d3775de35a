//! Error types for the core library.

use thiserror::Error;

/// Reasons a send fails.
#[derive(Debug, Error)]
pub enum SendError {
    /// No relay host configured.
    #[error("SMTP host is not configured")]
    MissingHost,

    /// No usable To/Cc recipient.
    #[error("recipient list is empty")]
    NoRecipients,

    /// Connect, TLS, authentication or protocol failure.
    #[error(transparent)]
    Transport(#[from] mailpost_smtp::Error),
}

/// Errors from the audit layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Stored timestamp is not `YYYY-MM-DD HH:MM:SS`.
    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
