//! Outbound message generation.

use crate::content_type::ContentType;
use crate::encoding::{CRLF, encode_base64_lines, encode_word};
use crate::error::{Error, Result};
use crate::header::{Headers, sanitize_header_value};
use chrono::{DateTime, FixedOffset, Local, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Date format of RFC 5322 §3.3, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
const RFC5322_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

static MESSAGE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a unique `Message-ID` value, angle brackets included.
///
/// The left part combines a nanosecond timestamp with a process-wide
/// counter so two calls in the same nanosecond still differ.
#[must_use]
pub fn generate_message_id(domain: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let sequence = MESSAGE_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let domain = if domain.is_empty() { "localhost" } else { domain };
    format!("<{nanos}.{sequence}@{domain}>")
}

/// Formats a timestamp as an RFC 5322 date-time.
#[must_use]
pub fn format_date(date: &DateTime<FixedOffset>) -> String {
    date.format(RFC5322_DATE_FORMAT).to_string()
}

/// Splits a composed message into its header block and body.
///
/// The header block keeps the CRLF of its last line; the separating blank
/// line belongs to neither part.
///
/// # Errors
///
/// Returns [`Error::MissingSeparator`] if there is no blank line.
pub fn split_raw(raw: &[u8]) -> Result<(&[u8], &[u8])> {
    raw.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| (&raw[..pos + 2], &raw[pos + 4..]))
        .ok_or(Error::MissingSeparator)
}

/// Mailbox (optional display name + address) for the `From` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address.
    pub address: String,
}

impl Mailbox {
    /// Creates a new mailbox with just an address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    /// Creates a new mailbox with a display name and address.
    #[must_use]
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Renders the mailbox as a header value.
    ///
    /// Both parts are sanitized. A non-empty display name is encoded as an
    /// RFC 2047 word: `=?UTF-8?B?...?= <address>`.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let address = sanitize_header_value(&self.address);
        let name = self
            .name
            .as_deref()
            .map(sanitize_header_value)
            .unwrap_or_default();

        if name.is_empty() {
            address
        } else {
            format!("{} <{address}>", encode_word(&name))
        }
    }
}

/// Composed single-part message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message headers, in output order.
    pub headers: Headers,
    /// Transfer-encoded body; every line ends with CRLF.
    pub body: String,
}

impl Message {
    /// Returns the wire form: headers, one blank line, body.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{CRLF}{}", self.headers, self.body)
    }
}

/// Builder for single-part, base64-encoded text messages.
///
/// ```ignore
/// use mailpost_mime::{Mailbox, MessageBuilder};
///
/// let bytes = MessageBuilder::new()
///     .message_id_domain("smtp.example.com")
///     .from(Mailbox::with_name("Support", "support@example.com"))
///     .to("user@example.com")
///     .subject("Welcome")
///     .body("Hello")
///     .build()
///     .to_bytes();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    message_id_domain: String,
    date: Option<DateTime<FixedOffset>>,
    from: Option<Mailbox>,
    to: Vec<String>,
    cc: Vec<String>,
    subject: String,
    content_type: ContentType,
    body: String,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the domain used on the right side of the generated `Message-ID`.
    #[must_use]
    pub fn message_id_domain(mut self, domain: impl Into<String>) -> Self {
        self.message_id_domain = domain.into();
        self
    }

    /// Sets the `Date` header; defaults to the current local time.
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the `From` mailbox.
    #[must_use]
    pub fn from(mut self, mailbox: Mailbox) -> Self {
        self.from = Some(mailbox);
        self
    }

    /// Adds a `To` recipient.
    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Adds several `To` recipients.
    #[must_use]
    pub fn to_all<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.to.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Adds a `Cc` recipient.
    #[must_use]
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Adds several `Cc` recipients.
    #[must_use]
    pub fn cc_all<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cc.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the body content type.
    #[must_use]
    pub const fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Sets the body text.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the message.
    ///
    /// Header order: `Message-ID`, `Date`, `From`, `To`, `Cc` (only when
    /// non-empty), `Subject`, `MIME-Version`, `Content-Type`,
    /// `Content-Transfer-Encoding`.
    #[must_use]
    pub fn build(self) -> Message {
        let mut headers = Headers::new();

        headers.add("Message-ID", generate_message_id(&self.message_id_domain));
        let date = self.date.unwrap_or_else(|| Local::now().fixed_offset());
        headers.add("Date", format_date(&date));

        if let Some(from) = &self.from {
            headers.add("From", from.to_header_value());
        }

        headers.add("To", join_sanitized(&self.to));
        if !self.cc.is_empty() {
            headers.add("Cc", join_sanitized(&self.cc));
        }

        headers.add("Subject", encode_word(&sanitize_header_value(&self.subject)));
        headers.add("MIME-Version", "1.0");
        headers.add("Content-Type", self.content_type.to_string());
        headers.add("Content-Transfer-Encoding", "base64");

        Message {
            headers,
            body: encode_base64_lines(self.body.as_bytes()),
        }
    }
}

fn join_sanitized(addresses: &[String]) -> String {
    addresses
        .iter()
        .map(|a| sanitize_header_value(a))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::encoding::{decode_base64, decode_encoded_words};

    fn fixed_date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2006-01-02T15:04:05-07:00").unwrap()
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(&fixed_date()), "Mon, 02 Jan 2006 15:04:05 -0700");
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = generate_message_id("smtp.example.com");
        let b = generate_message_id("smtp.example.com");
        assert_ne!(a, b);
        assert!(a.starts_with('<'));
        assert!(a.ends_with("@smtp.example.com>"));
    }

    #[test]
    fn test_message_id_empty_domain() {
        assert!(generate_message_id("").ends_with("@localhost>"));
    }

    #[test]
    fn test_mailbox_bare_address() {
        let mailbox = Mailbox::new(" a@example.com\r\n");
        assert_eq!(mailbox.to_header_value(), "a@example.com");
    }

    #[test]
    fn test_mailbox_with_name() {
        let mailbox = Mailbox::with_name("Support", "a@example.com");
        assert_eq!(mailbox.to_header_value(), "=?UTF-8?B?U3VwcG9ydA==?= <a@example.com>");
    }

    #[test]
    fn test_mailbox_blank_name_is_ignored() {
        let mailbox = Mailbox::with_name(" \r\n ", "a@example.com");
        assert_eq!(mailbox.to_header_value(), "a@example.com");
    }

    #[test]
    fn test_build_header_order() {
        let message = MessageBuilder::new()
            .message_id_domain("smtp.example.com")
            .date(fixed_date())
            .from(Mailbox::new("a@example.com"))
            .to("b@example.com")
            .cc("c@example.com")
            .subject("Hi")
            .body("Hello")
            .build();

        let names: Vec<&str> = message.headers.names().collect();
        assert_eq!(
            names,
            vec![
                "Message-ID",
                "Date",
                "From",
                "To",
                "Cc",
                "Subject",
                "MIME-Version",
                "Content-Type",
                "Content-Transfer-Encoding",
            ]
        );
        assert_eq!(message.headers.get("Date"), Some("Mon, 02 Jan 2006 15:04:05 -0700"));
        assert_eq!(message.headers.get("Content-Type"), Some("text/plain; charset=\"UTF-8\""));
        assert_eq!(message.body, "SGVsbG8=\r\n");
    }

    #[test]
    fn test_build_omits_empty_cc() {
        let message = MessageBuilder::new()
            .from(Mailbox::new("a@example.com"))
            .to("b@example.com")
            .build();
        assert!(message.headers.get("Cc").is_none());
    }

    #[test]
    fn test_build_html() {
        let message = MessageBuilder::new()
            .to("b@example.com")
            .content_type(ContentType::TextHtml)
            .body("<p>Hi</p>")
            .build();
        assert_eq!(message.headers.get("Content-Type"), Some("text/html; charset=\"UTF-8\""));
    }

    #[test]
    fn test_build_recipients_joined_and_sanitized() {
        let message = MessageBuilder::new()
            .to_all(["b@example.com", " c@example.com\r\n"])
            .cc_all(["d@example.com\nBcc: x@evil.com"])
            .build();
        assert_eq!(message.headers.get("To"), Some("b@example.com,c@example.com"));
        assert_eq!(message.headers.get("Cc"), Some("d@example.comBcc: x@evil.com"));
    }

    #[test]
    fn test_to_bytes_and_split() {
        let message = MessageBuilder::new()
            .to("b@example.com")
            .subject("Grüße")
            .body("Hello, World!")
            .build();
        let raw = message.to_bytes();

        let (head, body) = split_raw(&raw).unwrap();
        assert!(head.ends_with(b"\r\n"));
        assert!(!head.ends_with(b"\r\n\r\n"));

        let body = std::str::from_utf8(body).unwrap();
        assert_eq!(decode_base64(&body.replace("\r\n", "")).unwrap(), b"Hello, World!");

        let headers = Headers::parse(std::str::from_utf8(head).unwrap());
        assert_eq!(decode_encoded_words(headers.get("Subject").unwrap()).unwrap(), "Grüße");
    }

    #[test]
    fn test_split_without_separator() {
        assert!(matches!(
            split_raw(b"Subject: x\r\n"),
            Err(Error::MissingSeparator)
        ));
    }
}
