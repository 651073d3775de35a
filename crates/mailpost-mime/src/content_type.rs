//! MIME content type handling.

use std::fmt;

/// Content type of a single-part text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    /// `text/plain`.
    #[default]
    TextPlain,
    /// `text/html`.
    TextHtml,
}

impl ContentType {
    /// Charset declared for every text body.
    pub const CHARSET: &'static str = "UTF-8";

    /// Selects the content type from an HTML flag.
    #[must_use]
    pub const fn from_html_flag(is_html: bool) -> Self {
        if is_html { Self::TextHtml } else { Self::TextPlain }
    }

    /// Returns the `type/subtype` string.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::TextPlain => "text/plain",
            Self::TextHtml => "text/html",
        }
    }

    /// Checks if this is an HTML body.
    #[must_use]
    pub const fn is_html(self) -> bool {
        matches!(self, Self::TextHtml)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; charset=\"{}\"", self.mime_type(), Self::CHARSET)
    }
}
