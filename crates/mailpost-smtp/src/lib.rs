//! # mailpost-smtp
//!
//! An async SMTP submission client implementing RFC 5321.
//!
//! One submission session per [`Client`]: greet, optionally upgrade to TLS,
//! authenticate, run a single mail transaction and quit. Each step consumes
//! the client and returns it in its next state, so commands can only be sent
//! in a valid order and a failed step drops the connection.
//!
//! Certificates are verified against the webpki roots unless the caller opts
//! out with [`TlsVerification::SkipVerification`]. Connect, TLS handshake and
//! every command round-trip are bounded by timeouts.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpost_smtp::{Address, Client, SessionConfig};
//! use mailpost_smtp::connection::connect;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> mailpost_smtp::Result<()> {
//!     let stream = connect("smtp.example.com", 587, Duration::from_secs(30)).await?;
//!     let session = SessionConfig::new("smtp.example.com");
//!     let client = Client::from_stream(stream, session).await?;
//!
//!     let client = client.ehlo().await?.starttls().await?;
//!     let client = client.auth_plain("user@example.com", "password").await?;
//!
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!     let from = Address::new("sender@example.com")?;
//!     let to = Address::new("recipient@example.com")?;
//!
//!     let client = client.mail_from(&from, message.len()).await?;
//!     let client = client.rcpt_to(&to).await?;
//!     let client = client.data().await?;
//!     let client = client.send_message(message).await?;
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── auth_plain() ───→ Authenticated
//! └──────────────┘                              │
//!        │                                      │
//!        └─── mail_from() ───→ MailTransaction ←┘
//!                                   │
//!                               rcpt_to() ───→ RecipientAdded ─── data() ───→ Data
//! ```
//!
//! ## Modules
//!
//! - [`command`]: command lines and their log form
//! - [`connection`]: streams, TLS and the client
//! - [`parser`]: reply parsing
//! - [`types`]: addresses, extensions, replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, ServerInfo,
    SessionConfig, SmtpConnection, TlsVerification,
};
pub use error::{Error, Result};
pub use types::{
    Address, AuthMechanism, EnhancedStatus, Extension, Reply, ReplyClass, ReplyCode,
};

/// Well-known port for implicit TLS submission (RFC 8314).
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Default submission port (RFC 6409).
pub const SUBMISSION_PORT: u16 = 587;
