//! `mailpost` - send mail through an SMTP relay from the command line.
//!
//! Relay settings come from the `SMTP_*` environment variables; every send
//! is recorded in an audit log.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use anyhow::bail;
use clap::Parser;
use mailpost_core::{
    AuditLogger, AuditRecord, AuditSink, DailyFileSink, DispatchOutcome, SmtpConfig,
    SqliteAuditSink, send_email,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Args, Commands, SendArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailpost=info,mailpost_core=info,mailpost_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Send(send) => {
            let config = SmtpConfig::from_env().with_from_name(&send.from_name);
            let outcome = run_send(&send, &config).await;

            println!("{}", serde_json::to_string(&outcome)?);
            if !outcome.is_success() {
                bail!("send failed: {}", outcome.error_message());
            }
            Ok(())
        }
    }
}

/// Sends the message, then records the attempt. The outcome is the relay's
/// verdict only; audit problems are logged and never change it.
async fn run_send(args: &SendArgs, config: &SmtpConfig) -> DispatchOutcome {
    let message = args.message();
    info!(
        to = message.to.len(),
        cc = message.cc.len(),
        "Sending message"
    );

    let outcome = send_email(config, &message).await;

    let record = AuditRecord::new(
        args.request_ip.as_str(),
        &message,
        config,
        &outcome,
        args.request_data(),
    );
    record_audit(args, record).await;

    outcome
}

async fn record_audit(args: &SendArgs, record: AuditRecord) {
    if let Some(path) = &args.audit_db {
        match SqliteAuditSink::new(path).await {
            Ok(sink) => audit(sink, record).await,
            Err(e) => warn!(
                error = %e,
                path = %path,
                "Failed to open audit database, record dropped"
            ),
        }
    } else {
        let sink = args
            .audit_dir
            .clone()
            .map_or_else(DailyFileSink::default, DailyFileSink::new);
        audit(sink, record).await;
    }
}

/// Queues `record` and waits for the writer to drain.
async fn audit<S>(sink: S, record: AuditRecord)
where
    S: AuditSink + Send + Sync + 'static,
{
    let (logger, worker) = AuditLogger::spawn(sink);
    logger.log(record);
    drop(logger);
    if let Err(e) = worker.await {
        warn!(error = %e, "Audit writer panicked");
    }
}
