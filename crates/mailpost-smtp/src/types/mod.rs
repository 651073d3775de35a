//! Core SMTP types.

mod address;
mod extension;
mod reply;

pub use address::Address;
pub use extension::{AuthMechanism, Extension};
pub use reply::{EnhancedStatus, Reply, ReplyClass, ReplyCode};
