//! MIME encoding and decoding utilities.
//!
//! Supports Base64 body encoding (RFC 2045) and RFC 2047 "B" encoded words.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Line terminator used for every header and body line.
pub const CRLF: &str = "\r\n";

/// Maximum length of an encoded body line, excluding the terminator (RFC 2045 §6.8).
pub const MAX_LINE_LENGTH: usize = 76;

/// Maximum length of a single encoded word (RFC 2047 §2).
const MAX_ENCODED_WORD_LENGTH: usize = 75;

/// Charset used for all encoded words.
const CHARSET: &str = "UTF-8";

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Encodes data as Base64 and hard-wraps it at [`MAX_LINE_LENGTH`] columns.
///
/// Every line, including the last one, ends with CRLF. Empty input yields
/// an empty string.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let line_count = encoded.len().div_ceil(MAX_LINE_LENGTH);
    let mut result = String::with_capacity(encoded.len() + line_count * CRLF.len());

    // Base64 output is ASCII, so every byte offset is a char boundary.
    for start in (0..encoded.len()).step_by(MAX_LINE_LENGTH) {
        let end = (start + MAX_LINE_LENGTH).min(encoded.len());
        result.push_str(&encoded[start..end]);
        result.push_str(CRLF);
    }

    result
}

/// Encodes a header value as one or more RFC 2047 "B" encoded words.
///
/// The value is always encoded, even when it is plain ASCII. Text that would
/// produce a word longer than 75 characters is split on character boundaries
/// into several words, folded onto continuation lines (CRLF followed by a
/// space). An empty value encodes to an empty string.
#[must_use]
pub fn encode_word(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    // "=?UTF-8?B?" + "?=" leaves room for this many base64 characters,
    // which carry three bytes per four characters.
    let overhead = "=?".len() + CHARSET.len() + "?B?".len() + "?=".len();
    let max_bytes = (MAX_ENCODED_WORD_LENGTH - overhead) / 4 * 3;

    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;

    for (idx, ch) in text.char_indices() {
        let next = idx + ch.len_utf8();
        if next - start > max_bytes {
            words.push(format!("=?{CHARSET}?B?{}?=", encode_base64(&text.as_bytes()[start..end])));
            start = end;
        }
        end = next;
    }
    words.push(format!("=?{CHARSET}?B?{}?=", encode_base64(&text.as_bytes()[start..end])));

    words.join("\r\n ")
}

/// Decodes a header value containing RFC 2047 encoded words.
///
/// Folded continuation lines are unfolded first. Whitespace between two
/// adjacent encoded words is dropped, as required by RFC 2047 §6.2. Text
/// outside encoded words is kept verbatim.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed, uses an encoding other
/// than "B", or does not decode to UTF-8.
pub fn decode_encoded_words(value: &str) -> Result<String> {
    let unfolded = value.replace("\r\n", "");
    let mut result = String::new();
    let mut pending_space = String::new();
    let mut previous_was_word = false;

    for token in unfolded.split_inclusive(char::is_whitespace) {
        let word = token.trim_end();
        let trailing = &token[word.len()..];

        if word.is_empty() {
            pending_space.push_str(trailing);
            continue;
        }

        if word.starts_with("=?") && word.ends_with("?=") && word.len() > 4 {
            if !previous_was_word {
                result.push_str(&pending_space);
            }
            result.push_str(&decode_single_word(word)?);
            previous_was_word = true;
        } else {
            result.push_str(&pending_space);
            result.push_str(word);
            previous_was_word = false;
        }
        pending_space = trailing.to_string();
    }
    if !previous_was_word {
        result.push_str(&pending_space);
    }

    Ok(result)
}

fn decode_single_word(word: &str) -> Result<String> {
    let inner = &word[2..word.len() - 2];
    let parts: Vec<&str> = inner.split('?').collect();

    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(format!(
            "Invalid encoded word: {word}"
        )));
    }

    match parts[1].to_uppercase().as_str() {
        "B" => {
            let decoded = decode_base64(parts[2])?;
            String::from_utf8(decoded).map_err(Into::into)
        }
        other => Err(Error::InvalidEncoding(format!("Unknown encoding: {other}"))),
    }
}
