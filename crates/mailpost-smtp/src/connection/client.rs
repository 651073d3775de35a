//! Type-state SMTP client.

use super::stream::with_timeout;
use super::{ServerInfo, SmtpStream, TlsVerification};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, Reply, ReplyCode};
use bytes::{BufMut, BytesMut};
use std::marker::PhantomData;
use std::time::Duration;

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// Per-session settings the client needs after the stream is open.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Relay host name, used for STARTTLS server name and the
    /// plaintext-credentials check.
    pub relay_host: String,
    /// Name sent in `EHLO` / `HELO`.
    pub client_name: String,
    /// Certificate handling for a STARTTLS upgrade.
    pub tls_verification: TlsVerification,
    /// Upper bound for one command round-trip, including the data transfer.
    pub command_timeout: Duration,
}

impl SessionConfig {
    /// Default time allowed for a command round-trip.
    pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

    /// Creates settings for `relay_host` with `localhost` as client name.
    #[must_use]
    pub fn new(relay_host: impl Into<String>) -> Self {
        Self {
            relay_host: relay_host.into(),
            client_name: "localhost".to_string(),
            tls_verification: TlsVerification::default(),
            command_timeout: Self::DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the name sent in `EHLO`.
    #[must_use]
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Sets the certificate handling for STARTTLS.
    #[must_use]
    pub const fn tls_verification(mut self, verification: TlsVerification) -> Self {
        self.tls_verification = verification;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    fn relay_is_local(&self) -> bool {
        let host = self.relay_host.as_str();
        host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" || host == "::1"
    }
}

/// SMTP client with type-state pattern.
///
/// Every step consumes the client; a failed step drops it, which closes the
/// connection.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    session: SessionConfig,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;

    /// Returns true if the session is TLS-protected.
    fn is_encrypted(&self) -> bool;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn is_encrypted(&self) -> bool {
        self.stream.is_tls()
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the `220` greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server
    /// answers with anything but `220`.
    pub async fn from_stream(mut stream: SmtpStream, session: SessionConfig) -> Result<Self> {
        let greeting = with_timeout(
            session.command_timeout,
            "greeting",
            Self::read_reply(&mut stream),
        )
        .await??
        .ensure_code(ReplyCode::SERVICE_READY)?;
        tracing::debug!("S: {greeting}");

        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                ..ServerInfo::default()
            },
            session,
            _state: PhantomData,
        })
    }

    /// Sends `EHLO` and records the advertised extensions.
    ///
    /// Falls back to `HELO` (no extensions) when the server rejects `EHLO`.
    ///
    /// # Errors
    ///
    /// Returns an error if both greetings are rejected or the exchange fails.
    pub async fn ehlo(mut self) -> Result<Self> {
        let hostname = self.session.client_name.clone();
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: hostname.clone(),
            })
            .await?;

        let info = if reply.is_success() {
            ServerInfo::from_ehlo_lines(
                std::mem::take(&mut self.server_info.hostname),
                reply.message.iter().skip(1),
            )
        } else {
            tracing::debug!(code = %reply.code, "EHLO rejected, falling back to HELO");
            self.send_command(&Command::Helo { hostname })
                .await?
                .ensure_success()?;
            ServerInfo {
                hostname: std::mem::take(&mut self.server_info.hostname),
                ..ServerInfo::default()
            }
        };

        self.server_info = info;
        Ok(self)
    }

    /// Upgrades the connection with `STARTTLS` and repeats `EHLO`.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised, the server refuses it,
    /// or the handshake fails.
    pub async fn starttls(mut self) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.send_command(&Command::StartTls)
            .await?
            .ensure_code(ReplyCode::SERVICE_READY)?;

        let Self {
            stream,
            server_info,
            session,
            _state,
        } = self;
        let stream = with_timeout(
            session.command_timeout,
            "TLS handshake",
            stream.upgrade_to_tls(&session.relay_host, session.tls_verification),
        )
        .await??;
        tracing::debug!(host = %session.relay_host, "connection upgraded to TLS");

        Self {
            stream,
            server_info: ServerInfo {
                hostname: server_info.hostname,
                ..ServerInfo::default()
            },
            session,
            _state,
        }
        .ehlo()
        .await
    }

    /// Authenticates with `AUTH PLAIN`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server did not advertise `AUTH`, the
    /// connection is unencrypted and the relay is not the local host, or the
    /// credentials are rejected.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        if !self.server_info.supports_auth() {
            return Err(Error::NotSupported("AUTH".into()));
        }
        if !self.stream.is_tls() && !self.session.relay_is_local() {
            return Err(Error::InsecureAuth(self.session.relay_host.clone()));
        }

        self.send_command(&Command::auth_plain(username, password))
            .await?
            .ensure_success()?;

        Ok(self.into_state())
    }

    /// Starts a mail transaction without authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the message exceeds the server's `SIZE` limit or
    /// `MAIL FROM` is rejected.
    pub async fn mail_from(
        self,
        from: &Address,
        message_size: usize,
    ) -> Result<Client<MailTransaction>> {
        self.start_mail(from, message_size).await
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the message exceeds the server's `SIZE` limit or
    /// `MAIL FROM` is rejected.
    pub async fn mail_from(
        self,
        from: &Address,
        message_size: usize,
    ) -> Result<Client<MailTransaction>> {
        self.start_mail(from, message_size).await
    }
}

impl Client<MailTransaction> {
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if `RCPT TO` is rejected.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Client<RecipientAdded>> {
        self.add_recipient(to).await?;
        Ok(self.into_state())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if `RCPT TO` is rejected.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Self> {
        self.add_recipient(to).await?;
        Ok(self)
    }

    /// Sends `DATA` and waits for `354`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server answers with anything but `354`.
    pub async fn data(mut self) -> Result<Client<Data>> {
        self.send_command(&Command::Data)
            .await?
            .ensure_code(ReplyCode::START_DATA)?;
        Ok(self.into_state())
    }
}

impl Client<Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// Lines are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed and the terminating `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails or the server rejects the
    /// message.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Connected>> {
        let payload = encode_data(message);
        tracing::debug!(bytes = payload.len(), "C: <message data>");

        let stream = &mut self.stream;
        let reply = with_timeout(self.session.command_timeout, "message transfer", async {
            stream.write_all(&payload).await?;
            Self::read_reply(stream).await
        })
        .await??;
        tracing::debug!("S: {reply}");
        reply.ensure_success()?;

        Ok(self.into_state())
    }
}

// Common implementation for all states
impl<S> Client<S> {
    /// Sends `QUIT` and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the reply is not 2xx.
    pub async fn quit(mut self) -> Result<()> {
        self.send_command(&Command::Quit).await?.ensure_success()?;
        Ok(())
    }

    async fn start_mail(
        mut self,
        from: &Address,
        message_size: usize,
    ) -> Result<Client<MailTransaction>> {
        if let Some(limit) = self.server_info.max_message_size()
            && message_size > limit
        {
            return Err(Error::MessageTooLarge {
                size: message_size,
                limit,
            });
        }

        let size = self.server_info.supports_size().then_some(message_size);
        self.send_command(&Command::MailFrom {
            from: from.clone(),
            size,
        })
        .await?
        .ensure_success()?;

        Ok(self.into_state())
    }

    async fn add_recipient(&mut self, to: &Address) -> Result<()> {
        self.send_command(&Command::RcptTo { to: to.clone() })
            .await?
            .ensure_success()?;
        Ok(())
    }

    fn into_state<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            session: self.session,
            _state: PhantomData,
        }
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::debug!("C: {cmd}");
        let data = cmd.serialize();
        let stream = &mut self.stream;
        let reply = with_timeout(self.session.command_timeout, &cmd.to_string(), async {
            stream.write_all(&data).await?;
            Self::read_reply(stream).await
        })
        .await??;
        tracing::debug!("S: {reply}");
        Ok(reply)
    }

    async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = stream.read_line().await?;
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
        }

        parse_reply(&lines)
    }
}

/// Frames message bytes for the DATA phase.
fn encode_data(message: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(message.len() + message.len() / 32 + 5);

    if !message.is_empty() {
        let body = message.strip_suffix(b"\n").unwrap_or(message);
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                buf.put_u8(b'.');
            }
            buf.put_slice(line);
            buf.put_slice(b"\r\n");
        }
    }

    buf.put_slice(b".\r\n");
    buf
}
