//! Message composition.
//!
//! Turns an [`OutgoingMessage`] and the sender identity of an
//! [`SmtpConfig`] into transport-ready bytes. Pure: no I/O, no shared state
//! beyond the process-wide `Message-ID` counter.

use crate::config::SmtpConfig;
use crate::message::OutgoingMessage;
use chrono::{DateTime, FixedOffset, Local};
use mailpost_mime::{ContentType, Mailbox, MessageBuilder};

/// Composes a message stamped with the current local time.
///
/// Callers are expected to have checked that `message.to` is non-empty;
/// [`crate::send_email`] does.
#[must_use]
pub fn compose(config: &SmtpConfig, message: &OutgoingMessage) -> Vec<u8> {
    compose_at(config, message, Local::now().fixed_offset())
}

/// Composes a message with an explicit `Date`.
#[must_use]
pub fn compose_at(
    config: &SmtpConfig,
    message: &OutgoingMessage,
    date: DateTime<FixedOffset>,
) -> Vec<u8> {
    MessageBuilder::new()
        .message_id_domain(config.relay_host())
        .date(date)
        .from(Mailbox::with_name(&config.from_name, &config.from))
        .to_all(&message.to)
        .cc_all(&message.cc)
        .subject(&message.subject)
        .content_type(ContentType::from_html_flag(message.is_html))
        .body(&message.body)
        .build()
        .to_bytes()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailpost_mime::encoding::{decode_base64, decode_encoded_words};
    use mailpost_mime::{Headers, split_raw};

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com:2525".into(),
            from: "noreply@example.com".into(),
            from_name: "Zoë".into(),
            ..SmtpConfig::default()
        }
    }

    fn fixed_date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2006-01-02T15:04:05-07:00").unwrap()
    }

    fn headers_of(raw: &[u8]) -> Headers {
        let (head, _) = split_raw(raw).unwrap();
        Headers::parse(std::str::from_utf8(head).unwrap())
    }

    #[test]
    fn test_header_order_and_values() {
        let message = OutgoingMessage::new("Hello", "body")
            .to("a@example.com")
            .to("b@example.com")
            .cc("c@example.com");
        let raw = compose_at(&config(), &message, fixed_date());
        let headers = headers_of(&raw);

        assert_eq!(
            headers.names().collect::<Vec<_>>(),
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
        assert!(
            headers
                .get("Message-ID")
                .unwrap()
                .ends_with("@smtp.example.com>")
        );
        assert_eq!(headers.get("Date"), Some("Mon, 02 Jan 2006 15:04:05 -0700"));
        assert_eq!(headers.get("To"), Some("a@example.com,b@example.com"));
        assert_eq!(headers.get("Cc"), Some("c@example.com"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=\"UTF-8\"")
        );
        assert_eq!(headers.get("Content-Transfer-Encoding"), Some("base64"));

        let from = headers.get("From").unwrap();
        assert!(from.ends_with(" <noreply@example.com>"));
        assert_eq!(decode_encoded_words(from).unwrap(), "Zoë <noreply@example.com>");
    }

    #[test]
    fn test_cc_omitted_when_empty_and_html_flag() {
        let message = OutgoingMessage::new("s", "<b>x</b>")
            .to("a@example.com")
            .html(true);
        let raw = compose_at(&config(), &message, fixed_date());
        let headers = headers_of(&raw);

        assert!(headers.get("Cc").is_none());
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/html; charset=\"UTF-8\"")
        );
    }

    #[test]
    fn test_from_without_name_is_bare_address() {
        let config = SmtpConfig {
            from_name: "  \r\n".into(),
            ..config()
        };
        let message = OutgoingMessage::new("s", "b").to("a@example.com");
        let raw = compose_at(&config, &message, fixed_date());
        assert_eq!(headers_of(&raw).get("From"), Some("noreply@example.com"));
    }

    #[test]
    fn test_single_separator_and_crlf_only() {
        let body = "line one\nline two\r\n".repeat(40);
        let message = OutgoingMessage::new("Subject", body).to("a@example.com");
        let raw = compose_at(&config(), &message, fixed_date());

        let separators = raw.windows(4).filter(|w| *w == b"\r\n\r\n").count();
        assert_eq!(separators, 1);
        for (i, byte) in raw.iter().enumerate() {
            match byte {
                b'\r' => assert_eq!(raw.get(i + 1), Some(&b'\n'), "bare CR at {i}"),
                b'\n' => assert_eq!(raw[i - 1], b'\r', "bare LF at {i}"),
                _ => {}
            }
        }
    }

    #[test]
    fn test_body_round_trips_and_lines_are_bounded() {
        let body = "Grüße aus Köln! ".repeat(50);
        let message = OutgoingMessage::new("s", body.clone()).to("a@example.com");
        let raw = compose_at(&config(), &message, fixed_date());
        let (_, encoded) = split_raw(&raw).unwrap();
        let encoded = std::str::from_utf8(encoded).unwrap();

        let lines: Vec<&str> = encoded.split_terminator("\r\n").collect();
        assert!(lines.iter().all(|line| line.len() <= 76));
        let decoded = decode_base64(&lines.concat()).unwrap();
        assert_eq!(decoded, body.as_bytes());
    }

    #[test]
    fn test_header_injection_is_neutralized() {
        let config = SmtpConfig {
            from_name: "Eve\r\nBcc: attacker@evil.com".into(),
            ..config()
        };
        let message = OutgoingMessage::new("Hi\r\nBcc: attacker@evil.com", "b")
            .to("a@example.com\r\nBcc: attacker@evil.com")
            .cc("c@example.com\nX-Injected: 1");
        let raw = compose_at(&config, &message, fixed_date());
        let headers = headers_of(&raw);

        assert!(headers.get("Bcc").is_none());
        assert!(headers.get("X-Injected").is_none());
        assert_eq!(headers.get_all("From").len(), 1);
        assert_eq!(
            headers.get("To"),
            Some("a@example.comBcc: attacker@evil.com")
        );
        assert_eq!(
            decode_encoded_words(headers.get("Subject").unwrap()).unwrap(),
            "HiBcc: attacker@evil.com"
        );
    }

    #[test]
    fn test_compose_is_deterministic_apart_from_message_id() {
        let message = OutgoingMessage::new("Same", "same body")
            .to("a@example.com")
            .cc("b@example.com");
        let first = compose_at(&config(), &message, fixed_date());
        let second = compose_at(&config(), &message, fixed_date());
        assert_ne!(first, second);

        let strip = |raw: &[u8]| -> String {
            String::from_utf8(raw.to_vec())
                .unwrap()
                .split("\r\n")
                .filter(|line| !line.starts_with("Message-ID:"))
                .collect::<Vec<_>>()
                .join("\r\n")
        };
        assert_eq!(strip(&first), strip(&second));
    }

    #[test]
    fn test_empty_body_has_no_body_lines() {
        let message = OutgoingMessage::new("s", "").to("a@example.com");
        let raw = compose_at(&config(), &message, fixed_date());
        assert!(raw.ends_with(b"Content-Transfer-Encoding: base64\r\n\r\n"));
    }
}
