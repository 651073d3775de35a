//! Fire-and-forget audit writer.

use super::{AuditRecord, AuditSink};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Cloneable handle that queues records for a background writer task.
///
/// The task drains the queue until every handle is dropped, then exits.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    sender: mpsc::UnboundedSender<AuditRecord>,
}

impl AuditLogger {
    /// Spawns the writer task for `sink` on the current runtime.
    ///
    /// Await the returned handle after dropping every logger to make sure
    /// queued records have been written.
    #[must_use]
    pub fn spawn<S>(sink: S) -> (Self, JoinHandle<()>)
    where
        S: AuditSink + Send + Sync + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AuditRecord>();

        let worker = tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                if let Err(e) = sink.record(&record).await {
                    tracing::warn!(
                        error = %e,
                        request_ip = %record.request_ip,
                        "Failed to write audit record"
                    );
                }
            }
            tracing::debug!("audit writer stopped");
        });

        (Self { sender }, worker)
    }

    /// Queues a record. Never blocks and never fails the caller.
    pub fn log(&self, record: AuditRecord) {
        if self.sender.send(record).is_err() {
            tracing::warn!("Audit writer is gone, record dropped");
        }
    }
}
