//! # mailpost-mime
//!
//! MIME generation for outbound email.
//!
//! ## Features
//!
//! - **Message generation**: single-part `text/plain` or `text/html` bodies,
//!   base64 transfer encoding wrapped at 76 columns
//! - **Header encoding**: RFC 2047 "B" encoded words for display names and
//!   subjects, split and folded when long
//! - **Header sanitization**: CR/LF stripping for every caller-supplied value
//! - **CRLF framing**: one line terminator everywhere, exactly one blank line
//!   between headers and body
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpost_mime::{ContentType, Mailbox, MessageBuilder};
//!
//! let message = MessageBuilder::new()
//!     .message_id_domain("smtp.example.com")
//!     .from(Mailbox::with_name("Zoë", "sender@example.com"))
//!     .to("recipient@example.com")
//!     .subject("Test Message")
//!     .content_type(ContentType::TextPlain)
//!     .body("Hello, World!")
//!     .build();
//!
//! let bytes = message.to_bytes();
//! ```
//!
//! ### Encoding/Decoding
//!
//! ```ignore
//! use mailpost_mime::encoding::{encode_base64_lines, encode_word, decode_encoded_words};
//!
//! let body = encode_base64_lines(b"Hello, World!");
//! let subject = encode_word("Héllo");
//! assert_eq!(decode_encoded_words(&subject)?, "Héllo");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::{Headers, sanitize_header_value};
pub use message::{
    Mailbox, Message, MessageBuilder, format_date, generate_message_id, split_raw,
};
