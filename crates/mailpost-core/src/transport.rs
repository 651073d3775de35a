//! Connection establishment seam.

use mailpost_smtp::connection::{SmtpStream, connect, connect_tls};
use mailpost_smtp::{Result, TlsVerification};
use std::future::Future;
use std::time::Duration;

/// Opens the raw stream to a relay.
///
/// The dispatcher picks the method from the relay port; everything after
/// the stream exists is plain SMTP.
pub trait Transport {
    /// Opens a plaintext TCP connection (STARTTLS may follow).
    fn connect_plain(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<SmtpStream>> + Send;

    /// Opens a connection and completes the TLS handshake before any SMTP
    /// traffic.
    fn connect_implicit_tls(
        &self,
        host: &str,
        port: u16,
        verification: TlsVerification,
        timeout: Duration,
    ) -> impl Future<Output = Result<SmtpStream>> + Send;
}

/// Real network connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn connect_plain(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<SmtpStream>> + Send {
        connect(host, port, timeout)
    }

    fn connect_implicit_tls(
        &self,
        host: &str,
        port: u16,
        verification: TlsVerification,
        timeout: Duration,
    ) -> impl Future<Output = Result<SmtpStream>> + Send {
        connect_tls(host, port, verification, timeout)
    }
}
