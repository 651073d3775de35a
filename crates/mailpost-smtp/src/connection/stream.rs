//! Low-level SMTP stream handling.

use super::tls::{TlsVerification, create_tls_connector};
use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Maximum reply line length accepted from a server (RFC 5321 §4.5.3.1.5
/// allows 512; some servers send longer EHLO lines).
const MAX_LINE_LENGTH: usize = 4096;

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

impl SmtpStream {
    /// Reads one reply line, without its line terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails, the peer closes the connection,
    /// or the line exceeds the length limit.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = match self {
            Self::Tcp(reader) => {
                let mut limited = reader.take(MAX_LINE_LENGTH as u64);
                limited.read_line(&mut line).await?
            }
            Self::Tls(reader) => {
                let mut limited = reader.as_mut().take(MAX_LINE_LENGTH as u64);
                limited.read_line(&mut line).await?
            }
        };

        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        if !line.ends_with('\n') && read >= MAX_LINE_LENGTH {
            return Err(Error::Protocol("reply line too long".into()));
        }

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        Ok(())
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Upgrades a TCP stream to TLS (after a successful `STARTTLS`).
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted, the host name is
    /// not a valid server name, or the TLS handshake fails.
    pub async fn upgrade_to_tls(
        self,
        hostname: &str,
        verification: TlsVerification,
    ) -> Result<Self> {
        let tcp_stream = match self {
            Self::Tcp(reader) => reader.into_inner(),
            Self::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
        };

        let tls_stream = handshake(tcp_stream, hostname, verification).await?;
        Ok(Self::Tls(Box::new(BufReader::new(tls_stream))))
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails or does not complete within
/// `connect_timeout`.
pub async fn connect(hostname: &str, port: u16, connect_timeout: Duration) -> Result<SmtpStream> {
    tracing::debug!(hostname, port, "connecting");
    let stream =
        with_timeout(connect_timeout, "connect", TcpStream::connect((hostname, port))).await??;
    Ok(SmtpStream::Tcp(BufReader::new(stream)))
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// The handshake completes before any SMTP dialogue.
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails or does not
/// complete within `connect_timeout`.
pub async fn connect_tls(
    hostname: &str,
    port: u16,
    verification: TlsVerification,
    connect_timeout: Duration,
) -> Result<SmtpStream> {
    tracing::debug!(hostname, port, "connecting with implicit TLS");

    with_timeout(connect_timeout, "TLS connect", async {
        let tcp_stream = TcpStream::connect((hostname, port)).await?;
        let tls_stream = handshake(tcp_stream, hostname, verification).await?;
        Ok::<_, Error>(SmtpStream::Tls(Box::new(BufReader::new(tls_stream))))
    })
    .await?
}

async fn handshake(
    tcp_stream: TcpStream,
    hostname: &str,
    verification: TlsVerification,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let connector = create_tls_connector(verification);
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

    Ok(connector.connect(server_name, tcp_stream).await?)
}

/// Runs a future with a deadline, mapping expiry to [`Error::Timeout`].
pub(crate) async fn with_timeout<F: Future>(
    duration: Duration,
    operation: &str,
    future: F,
) -> Result<F::Output> {
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| Error::Timeout(format!("{operation} timed out after {duration:?}")))
}
