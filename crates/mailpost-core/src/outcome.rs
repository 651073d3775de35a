//! Observable result of a send.

use crate::error::SendError;
use serde::{Deserialize, Serialize};

/// Success, or failure with a human-readable diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// True when the relay accepted the message.
    pub success: bool,
    /// Diagnostic for a failed send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchOutcome {
    /// A successful send.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed send.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    /// Returns true if the send succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the failure diagnostic, or an empty string on success.
    #[must_use]
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }
}

impl From<Result<(), SendError>> for DispatchOutcome {
    fn from(result: Result<(), SendError>) -> Self {
        match result {
            Ok(()) => Self::success(),
            Err(err) => Self::failure(err.to_string()),
        }
    }
}
