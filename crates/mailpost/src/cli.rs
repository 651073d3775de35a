//! Command-line arguments.

use std::path::PathBuf;

use mailpost_core::{OutgoingMessage, parse_html_flag, split_address_list};
use serde_json::{Value, json};

/// Submit mail through the SMTP relay configured in the environment.
#[derive(Debug, clap::Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Compose a message and send it to its To and Cc recipients
    Send(SendArgs),
}

#[derive(Debug, Clone, PartialEq, Eq, clap::Args)]
pub struct SendArgs {
    /// Comma-separated primary recipients
    #[arg(long)]
    pub to: String,

    /// Comma-separated carbon-copy recipients
    #[arg(long, default_value = "")]
    pub cc: String,

    #[arg(long, default_value = "")]
    pub subject: String,

    #[arg(long, default_value = "")]
    pub body: String,

    /// Send as HTML: true, 1, "true" or "1"
    #[arg(long)]
    pub html: Option<String>,

    /// Sender display name, overrides `SMTP_FROM_NAME`
    #[arg(long, default_value = "")]
    pub from_name: String,

    /// Client address recorded in the audit entry
    #[arg(long, default_value = "127.0.0.1")]
    pub request_ip: String,

    /// Directory for daily JSON audit files
    #[arg(long, value_name = "DIR", conflicts_with = "audit_db")]
    pub audit_dir: Option<PathBuf>,

    /// `SQLite` database for audit records
    #[arg(long, value_name = "PATH")]
    pub audit_db: Option<String>,
}

impl SendArgs {
    /// The `--html` value as JSON, falling back to a plain string.
    pub fn html_value(&self) -> Value {
        self.html.as_ref().map_or(Value::Null, |raw| {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        })
    }

    pub fn message(&self) -> OutgoingMessage {
        let mut message = OutgoingMessage::new(&self.subject, &self.body)
            .html(parse_html_flag(&self.html_value()));
        message.to = split_address_list(&self.to);
        message.cc = split_address_list(&self.cc);
        message
    }

    /// Raw request fields, kept alongside the audit record.
    pub fn request_data(&self) -> Value {
        json!({
            "to": self.to,
            "cc": self.cc,
            "subject": self.subject,
            "body": self.body,
            "is_html": self.html_value(),
            "from_name": self.from_name,
        })
    }
}
