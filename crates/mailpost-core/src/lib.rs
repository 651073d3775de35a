//! # mailpost-core
//!
//! Mail submission core for `mailpost`.
//!
//! This crate provides:
//! - **Configuration** - relay, credentials and sender identity from the
//!   environment
//! - **Message Composer** - structured input to CRLF-framed, base64-encoded
//!   message bytes, with header sanitization
//! - **Transport Dispatcher** - one SMTP session per send, implicit TLS on
//!   port 465 or STARTTLS elsewhere, success/failure outcome
//! - **Audit** - fire-and-forget records to daily JSON log files or `SQLite`
//!
//! ```ignore
//! use mailpost_core::{OutgoingMessage, SmtpConfig, send_email};
//!
//! let config = SmtpConfig::from_env();
//! let message = OutgoingMessage::new("Hello", "Hi there").to("user@example.com");
//! let outcome = send_email(&config, &message).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod audit;
mod compose;
pub mod config;
mod dispatch;
mod error;
mod message;
mod outcome;
pub mod transport;

pub use audit::{AuditLogger, AuditRecord, AuditSink, DailyFileSink, SqliteAuditSink};
pub use compose::{compose, compose_at};
pub use config::{Security, SmtpConfig};
pub use dispatch::{dispatch, dispatch_with, send_email, send_email_with};
pub use error::{Error, Result, SendError};
pub use message::{OutgoingMessage, parse_html_flag, split_address_list};
pub use outcome::DispatchOutcome;
pub use transport::{TcpTransport, Transport};
