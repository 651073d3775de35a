//! Envelope address type.

use crate::error::{Error, Result};

/// Address used in `MAIL FROM` / `RCPT TO`.
///
/// Only checks that the value can be placed inside `<...>` on a single
/// command line; syntax is left to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new envelope address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is empty or contains CR, LF, `<`, `>`
    /// or whitespace.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }
        if let Some(bad) = addr
            .chars()
            .find(|c| matches!(c, '<' | '>') || c.is_whitespace() || c.is_control())
        {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} contains forbidden character {bad:?}"
            )));
        }
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
