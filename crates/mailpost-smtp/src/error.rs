//! Error types for SMTP operations.

use crate::types::{Reply, ReplyClass, ReplyCode};
use std::io;

/// Result of an SMTP operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can end an SMTP session early.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket failure, including a closed connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS configuration or handshake failure.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The server answered with an unexpected code.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Three-digit reply code.
        code: u16,
        /// Reply text, lines joined by `\n`.
        message: String,
    },

    /// Malformed or out-of-sequence reply.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Envelope address cannot be placed in a command line.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// The server did not advertise a required extension.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Credentials would be sent in the clear to a remote host.
    #[error("Refusing to send credentials over an unencrypted connection to {0}")]
    InsecureAuth(String),

    /// Message larger than the server's advertised `SIZE`.
    #[error("Message of {size} bytes exceeds server limit of {limit} bytes")]
    MessageTooLarge {
        /// Message size in bytes.
        size: usize,
        /// Limit advertised by the server.
        limit: usize,
    },

    /// Connect, handshake or command round-trip took too long.
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Creates an SMTP error carrying a rejected reply.
    #[must_use]
    pub fn from_reply(reply: &Reply) -> Self {
        Self::smtp_error(reply.code.as_u16(), reply.message_text())
    }

    /// Class of the rejecting reply, if this error came from the server.
    #[must_use]
    pub const fn reply_class(&self) -> Option<ReplyClass> {
        match self {
            Self::SmtpError { code, .. } => Some(ReplyCode::new(*code).class()),
            _ => None,
        }
    }

    /// Returns true if the server rejected with a 5xx reply.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self.reply_class(), Some(ReplyClass::PermanentFailure))
    }

    /// Returns true if the server rejected with a 4xx reply.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.reply_class(), Some(ReplyClass::TransientFailure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReplyCode;

    #[test]
    fn test_from_reply_carries_code_and_text() {
        let reply = Reply::new(
            ReplyCode::MAILBOX_UNAVAILABLE,
            vec!["5.1.1 no such user".to_string()],
        );
        let err = Error::from_reply(&reply);
        assert!(err.is_permanent());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "SMTP error 550: 5.1.1 no such user");
    }

    #[test]
    fn test_transient() {
        assert!(Error::smtp_error(451, "try later").is_transient());
        assert!(!Error::Protocol("x".into()).is_transient());
    }

    #[test]
    fn test_message_too_large_display() {
        let err = Error::MessageTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Message of 2048 bytes exceeds server limit of 1024 bytes"
        );
    }
}
