//! SMTP dispatch.
//!
//! One connection per call: connect (implicit TLS on port 465, plaintext
//! with opportunistic STARTTLS otherwise), EHLO, AUTH PLAIN when a user name
//! is configured, one transaction, QUIT. Any failure aborts the rest and
//! becomes a failed [`DispatchOutcome`].

use crate::compose::compose;
use crate::config::{Security, SmtpConfig};
use crate::error::SendError;
use crate::message::OutgoingMessage;
use crate::outcome::DispatchOutcome;
use crate::transport::{TcpTransport, Transport};
use mailpost_mime::sanitize_header_value;
use mailpost_smtp::{Address, Client, SessionConfig, SmtpConnection};

/// Sends already-composed message bytes to `recipients` through the
/// configured relay.
pub async fn dispatch(
    config: &SmtpConfig,
    message: &[u8],
    recipients: &[String],
) -> DispatchOutcome {
    dispatch_with(&TcpTransport, config, message, recipients).await
}

/// [`dispatch`] over a caller-supplied [`Transport`].
pub async fn dispatch_with<T: Transport + Sync>(
    transport: &T,
    config: &SmtpConfig,
    message: &[u8],
    recipients: &[String],
) -> DispatchOutcome {
    let result = deliver(transport, config, message, recipients).await;
    log_result(config, &result);
    result.into()
}

/// Composes `message` and sends it to its To and Cc recipients.
///
/// Fails without touching the network when the relay host is unset or the
/// message has no To recipient.
pub async fn send_email(config: &SmtpConfig, message: &OutgoingMessage) -> DispatchOutcome {
    send_email_with(&TcpTransport, config, message).await
}

/// [`send_email`] over a caller-supplied [`Transport`].
pub async fn send_email_with<T: Transport + Sync>(
    transport: &T,
    config: &SmtpConfig,
    message: &OutgoingMessage,
) -> DispatchOutcome {
    let result = match precheck(config, message) {
        Ok(()) => {
            let bytes = compose(config, message);
            deliver(transport, config, &bytes, &message.envelope_recipients()).await
        }
        Err(err) => Err(err),
    };
    log_result(config, &result);
    result.into()
}

fn precheck(config: &SmtpConfig, message: &OutgoingMessage) -> Result<(), SendError> {
    if config.relay_host().is_empty() {
        return Err(SendError::MissingHost);
    }
    if message
        .to
        .iter()
        .all(|addr| sanitize_header_value(addr).is_empty())
    {
        return Err(SendError::NoRecipients);
    }
    Ok(())
}

fn log_result(config: &SmtpConfig, result: &Result<(), SendError>) {
    let (host, port) = config.relay();
    match result {
        Ok(()) => tracing::info!(host, port, "message accepted by relay"),
        Err(err) => tracing::warn!(host, port, error = %err, "send failed"),
    }
}

async fn deliver<T: Transport + Sync>(
    transport: &T,
    config: &SmtpConfig,
    message: &[u8],
    recipients: &[String],
) -> Result<(), SendError> {
    let (host, port) = config.relay();
    if host.is_empty() {
        return Err(SendError::MissingHost);
    }

    let recipients = recipients
        .iter()
        .map(|addr| sanitize_header_value(addr))
        .filter(|addr| !addr.is_empty())
        .map(Address::new)
        .collect::<Result<Vec<_>, _>>()?;
    let Some((first, rest)) = recipients.split_first() else {
        return Err(SendError::NoRecipients);
    };
    let from = Address::new(sanitize_header_value(&config.from))?;

    let security = Security::for_port(port);
    tracing::info!(
        host,
        port,
        security = security.display_name(),
        recipients = recipients.len(),
        "sending message"
    );

    let stream = match security {
        Security::ImplicitTls => {
            transport
                .connect_implicit_tls(host, port, config.tls_verification, config.connect_timeout)
                .await?
        }
        Security::StartTls => {
            transport
                .connect_plain(host, port, config.connect_timeout)
                .await?
        }
    };

    let session = SessionConfig::new(host)
        .client_name(config.helo_name.as_str())
        .tls_verification(config.tls_verification)
        .command_timeout(config.command_timeout);

    let mut client = Client::from_stream(stream, session).await?.ehlo().await?;
    if security == Security::StartTls && client.server_info().supports_starttls() {
        client = client.starttls().await?;
    }

    let client = if config.username.is_empty() {
        client.mail_from(&from, message.len()).await?
    } else {
        client
            .auth_plain(&config.username, &config.password)
            .await?
            .mail_from(&from, message.len())
            .await?
    };

    let mut client = client.rcpt_to(first).await?;
    for recipient in rest {
        client = client.rcpt_to(recipient).await?;
    }

    client
        .data()
        .await?
        .send_message(message)
        .await?
        .quit()
        .await?;

    Ok(())
}
