//! Server replies (RFC 5321 section 4.2) and enhanced status codes
//! (RFC 3463).

use crate::error::{Error, Result};
use std::fmt;

/// A complete, possibly multi-line, server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit code shared by every line.
    pub code: ReplyCode,
    /// Text after the code, one entry per line.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Whether the server accepted the command (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code.class(), ReplyClass::Completion)
    }

    /// The reply text with lines joined by `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Enhanced status code at the start of the first line, if any.
    #[must_use]
    pub fn enhanced_status(&self) -> Option<EnhancedStatus> {
        let first = self.message.first()?;
        first
            .split_whitespace()
            .next()
            .and_then(EnhancedStatus::parse)
    }

    /// Passes 2xx replies through; anything else becomes [`Error::SmtpError`].
    ///
    /// # Errors
    ///
    /// Returns the rejected code and text.
    pub fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(Error::from_reply(&self))
    }

    /// Passes the reply through only when its code is `expected`.
    ///
    /// # Errors
    ///
    /// Returns the unexpected code and text.
    pub fn ensure_code(self, expected: ReplyCode) -> Result<Self> {
        if self.code != expected {
            return Err(Error::from_reply(&self));
        }
        Ok(self)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message.join(" | "))
    }
}

/// First digit of a reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 2xx
    Completion,
    /// 3xx, the server waits for more input
    Intermediate,
    /// 4xx, retrying later may succeed
    TransientFailure,
    /// 5xx
    PermanentFailure,
    /// Anything outside 200..=599
    Unknown,
}

/// Three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220
    pub const SERVICE_READY: Self = Self(220);
    /// 221
    pub const CLOSING: Self = Self(221);
    /// 235
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250
    pub const OK: Self = Self(250);
    /// 354
    pub const START_DATA: Self = Self(354);
    /// 421
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 502
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 535
    pub const AUTH_FAILED: Self = Self(535);
    /// 550
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);

    /// Wraps a raw code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// The raw code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Category from the first digit.
    #[must_use]
    pub const fn class(self) -> ReplyClass {
        match self.0 / 100 {
            2 => ReplyClass::Completion,
            3 => ReplyClass::Intermediate,
            4 => ReplyClass::TransientFailure,
            5 => ReplyClass::PermanentFailure,
            _ => ReplyClass::Unknown,
        }
    }

    /// 2xx
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self.class(), ReplyClass::Completion)
    }

    /// 3xx
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        matches!(self.class(), ReplyClass::Intermediate)
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// `class.subject.detail` status such as `5.1.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnhancedStatus {
    /// 2, 4 or 5
    pub class: u8,
    /// Subject area, e.g. 1 for addressing
    pub subject: u16,
    /// Detail within the subject
    pub detail: u16,
}

impl EnhancedStatus {
    /// Parses `x.y.z` where the class is 2, 4 or 5 and the other parts have
    /// at most three digits.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let class = parts.next()?.parse::<u8>().ok()?;
        let subject = parse_component(parts.next()?)?;
        let detail = parse_component(parts.next()?)?;
        if parts.next().is_some() || !matches!(class, 2 | 4 | 5) {
            return None;
        }
        Some(Self {
            class,
            subject,
            detail,
        })
    }
}

fn parse_component(part: &str) -> Option<u16> {
    if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl fmt::Display for EnhancedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.class, self.subject, self.detail)
    }
}
