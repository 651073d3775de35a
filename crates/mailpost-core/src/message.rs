//! Message description and request-boundary parsing helpers.

use mailpost_mime::sanitize_header_value;
use serde::{Deserialize, Serialize};

/// An email message to send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Recipient addresses. At least one is required to send.
    pub to: Vec<String>,
    /// CC addresses.
    #[serde(default)]
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Body text, plain or HTML.
    pub body: String,
    /// Sends the body as `text/html` when true.
    #[serde(default)]
    pub is_html: bool,
}

impl OutgoingMessage {
    /// Creates a new plain-text message.
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Adds a CC recipient.
    #[must_use]
    pub fn cc(mut self, recipient: impl Into<String>) -> Self {
        self.cc.push(recipient.into());
        self
    }

    /// Sets whether the body is HTML.
    #[must_use]
    pub const fn html(mut self, is_html: bool) -> Self {
        self.is_html = is_html;
        self
    }

    /// Returns the envelope recipients: To then Cc, each sanitized, empty
    /// entries dropped.
    #[must_use]
    pub fn envelope_recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(&self.cc)
            .map(|addr| sanitize_header_value(addr))
            .filter(|addr| !addr.is_empty())
            .collect()
    }
}

/// Splits a comma-separated address list, trimming entries and dropping
/// empty ones.
///
/// ```
/// use mailpost_core::split_address_list;
///
/// assert_eq!(split_address_list("a@x.com, ,b@y.com,"), vec!["a@x.com", "b@y.com"]);
/// ```
#[must_use]
pub fn split_address_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Interprets a loosely-typed "is HTML" request field.
///
/// `true`, `"1"`, `"true"` and the number 1 (integer or float) are true;
/// everything else, including `null` and a missing field, is false.
#[must_use]
pub fn parse_html_flag(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::String(text) => text == "1" || text == "true",
        serde_json::Value::Number(number) => number
            .as_i64()
            .map(|n| n == 1)
            .or_else(|| number.as_f64().map(|f| (f - 1.0).abs() < f64::EPSILON))
            .unwrap_or(false),
        _ => false,
    }
}
