//! Client commands and their wire form.

use crate::types::{Address, AuthMechanism};
use base64::Engine;
use std::fmt::{self, Write};

/// A command line the client sends.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO`, used when the server rejects `EHLO`
    Helo {
        /// Name the client announces
        hostname: String,
    },
    /// `EHLO`
    Ehlo {
        /// Name the client announces
        hostname: String,
    },
    /// `STARTTLS`
    StartTls,
    /// `AUTH <mechanism> [initial-response]`
    Auth {
        /// SASL mechanism
        mechanism: AuthMechanism,
        /// Base64 initial response sent on the same line
        initial_response: Option<String>,
    },
    /// `MAIL FROM:<addr> [SIZE=n]`
    MailFrom {
        /// Envelope sender
        from: Address,
        /// Declared message size, sent only when the server advertises SIZE
        size: Option<usize>,
    },
    /// `RCPT TO:<addr>`
    RcptTo {
        /// Envelope recipient
        to: Address,
    },
    /// `DATA`
    Data,
    /// `QUIT`
    Quit,
}

impl Command {
    /// `AUTH PLAIN` with the RFC 4616 initial response
    /// (`\0username\0password`, base64).
    #[must_use]
    pub fn auth_plain(username: &str, password: &str) -> Self {
        let credentials = format!("\0{username}\0{password}");
        Self::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(
                base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes()),
            ),
        }
    }

    /// The command line as sent, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut line = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_line(&mut line, false);
        line.push_str("\r\n");
        line.into_bytes()
    }

    fn write_line(&self, out: &mut impl Write, redact: bool) -> fmt::Result {
        match self {
            Self::Helo { hostname } => write!(out, "HELO {hostname}"),
            Self::Ehlo { hostname } => write!(out, "EHLO {hostname}"),
            Self::StartTls => out.write_str("STARTTLS"),
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                write!(out, "AUTH {}", mechanism.as_str())?;
                match initial_response {
                    Some(_) if redact => out.write_str(" <redacted>"),
                    Some(response) => write!(out, " {response}"),
                    None => Ok(()),
                }
            }
            Self::MailFrom { from, size } => {
                write!(out, "MAIL FROM:<{}>", from.as_str())?;
                match size {
                    Some(size) => write!(out, " SIZE={size}"),
                    None => Ok(()),
                }
            }
            Self::RcptTo { to } => write!(out, "RCPT TO:<{}>", to.as_str()),
            Self::Data => out.write_str("DATA"),
            Self::Quit => out.write_str("QUIT"),
        }
    }
}

/// Log form: the line without CRLF, AUTH responses redacted.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_line(f, true)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({self})")
    }
}
