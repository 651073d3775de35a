//! Daily JSON-lines log files.

use super::{AuditRecord, AuditSink};
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Appends one JSON object per line to `<dir>/email_<YYYY-MM-DD>.log`.
#[derive(Debug, Clone)]
pub struct DailyFileSink {
    dir: PathBuf,
}

impl DailyFileSink {
    /// Directory used when none is configured.
    pub const DEFAULT_DIR: &'static str = "./runtime/email_logs";

    /// Creates a sink writing into `dir`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the log directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file a record is appended to.
    #[must_use]
    pub fn path_for(&self, record: &AuditRecord) -> PathBuf {
        self.dir.join(format!("email_{}.log", record.day()))
    }
}

impl Default for DailyFileSink {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIR)
    }
}

impl AuditSink for DailyFileSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(record))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
