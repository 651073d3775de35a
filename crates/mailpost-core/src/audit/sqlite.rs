//! `SQLite` audit storage.

use super::{AuditRecord, AuditSink};
use crate::Result;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Stores audit records in an `email_logs` table.
pub struct SqliteAuditSink {
    pool: SqlitePool,
}

impl SqliteAuditSink {
    /// Create a new sink with the given database path.
    ///
    /// Creates the database and table if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let sink = Self { pool };
        sink.initialize().await?;
        Ok(sink)
    }

    /// Create an in-memory sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let sink = Self { pool };
        sink.initialize().await?;
        Ok(sink)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS email_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_ip TEXT NOT NULL DEFAULT '',
                to_email TEXT NOT NULL DEFAULT '',
                cc_email TEXT NOT NULL DEFAULT '',
                subject TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                is_html INTEGER NOT NULL DEFAULT 0,
                success INTEGER NOT NULL DEFAULT 0,
                error_msg TEXT NOT NULL DEFAULT '',
                smtp_host TEXT NOT NULL DEFAULT '',
                smtp_port INTEGER NOT NULL DEFAULT 0,
                request_data TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_email_logs_created
            ON email_logs(created_at)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM email_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    /// Returns the most recent records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a stored row has an
    /// unreadable timestamp or request payload.
    pub async fn recent(&self, limit: u32) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query(
            r"
            SELECT request_ip, to_email, cc_email, subject, body, is_html, success,
                   error_msg, smtp_host, smtp_port, request_data, created_at
            FROM email_logs
            ORDER BY id DESC
            LIMIT ?
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<AuditRecord> {
                let created_at: String = row.get("created_at");
                let timestamp = chrono::NaiveDateTime::parse_from_str(
                    &created_at,
                    super::record::timestamp_format::FORMAT,
                )?;
                let request_data = match row.get::<Option<String>, _>("request_data") {
                    Some(raw) => serde_json::from_str(&raw)?,
                    None => serde_json::Value::Null,
                };

                Ok(AuditRecord {
                    timestamp,
                    request_ip: row.get("request_ip"),
                    to: split_joined(&row.get::<String, _>("to_email")),
                    cc: split_joined(&row.get::<String, _>("cc_email")),
                    subject: row.get("subject"),
                    body: row.get("body"),
                    is_html: row.get::<bool, _>("is_html"),
                    success: row.get::<bool, _>("success"),
                    error: row.get("error_msg"),
                    smtp_host: row.get("smtp_host"),
                    smtp_port: row.get::<u16, _>("smtp_port"),
                    request_data,
                })
            })
            .collect()
    }
}

impl AuditSink for SqliteAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        let request_data = if record.request_data.is_null() {
            None
        } else {
            Some(serde_json::to_string(&record.request_data)?)
        };

        sqlx::query(
            r"
            INSERT INTO email_logs
                (request_ip, to_email, cc_email, subject, body, is_html, success,
                 error_msg, smtp_host, smtp_port, request_data, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.request_ip)
        .bind(record.to.join(","))
        .bind(record.cc.join(","))
        .bind(&record.subject)
        .bind(&record.body)
        .bind(record.is_html)
        .bind(record.success)
        .bind(&record.error)
        .bind(&record.smtp_host)
        .bind(record.smtp_port)
        .bind(request_data)
        .bind(
            record
                .timestamp
                .format(super::record::timestamp_format::FORMAT)
                .to_string(),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn split_joined(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}
