//! Audit record model.

use crate::config::SmtpConfig;
use crate::message::OutgoingMessage;
use crate::outcome::DispatchOutcome;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One send attempt, as written to the audit sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Local wall-clock time of the attempt.
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    /// Address of the requesting client.
    pub request_ip: String,
    /// To recipients.
    pub to: Vec<String>,
    /// Cc recipients.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    /// Subject as requested.
    pub subject: String,
    /// Body as requested.
    pub body: String,
    /// Whether the body was sent as HTML.
    pub is_html: bool,
    /// Whether the relay accepted the message.
    pub success: bool,
    /// Failure diagnostic.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Relay host.
    pub smtp_host: String,
    /// Relay port.
    pub smtp_port: u16,
    /// Raw request payload, if the caller kept it.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub request_data: serde_json::Value,
}

impl AuditRecord {
    /// Captures a send attempt, stamped with the current local time.
    #[must_use]
    pub fn new(
        request_ip: impl Into<String>,
        message: &OutgoingMessage,
        config: &SmtpConfig,
        outcome: &DispatchOutcome,
        request_data: serde_json::Value,
    ) -> Self {
        let (host, port) = config.relay();
        Self {
            timestamp: Local::now().naive_local(),
            request_ip: request_ip.into(),
            to: message.to.clone(),
            cc: message.cc.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            is_html: message.is_html,
            success: outcome.success,
            error: outcome.error_message().to_string(),
            smtp_host: host.to_string(),
            smtp_port: port,
            request_data,
        }
    }

    /// Returns the `YYYY-MM-DD` day the record belongs to.
    #[must_use]
    pub fn day(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }
}

/// `YYYY-MM-DD HH:MM:SS`, local time without offset.
pub(crate) mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(
        value: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
