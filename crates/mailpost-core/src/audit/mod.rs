//! Audit trail of send attempts.
//!
//! Records are handed to an [`AuditLogger`], which writes them to an
//! [`AuditSink`] on a background task. Sink failures are logged and never
//! reach the sender.

mod file;
mod logger;
mod record;
mod sqlite;

pub use file::DailyFileSink;
pub use logger::AuditLogger;
pub use record::AuditRecord;
pub use sqlite::SqliteAuditSink;

use crate::Result;
use std::future::Future;

/// Destination for audit records.
pub trait AuditSink {
    /// Persists one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn record(&self, record: &AuditRecord) -> impl Future<Output = Result<()>> + Send;
}
