//! Integration tests for composing and dispatching mail.
//!
//! A fake relay on 127.0.0.1 plays the server side of the SMTP dialogue and
//! records every session. It can offer STARTTLS or speak TLS from the first
//! byte, using a self-signed certificate generated per test.
//! `RecordingTransport` notes which connection path the dispatcher picked and
//! redirects it to the fake relay. The implicit-TLS path hands back plain TCP
//! unless real TLS is requested, so port selection can be checked without
//! certificates.

#![allow(clippy::unwrap_used)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

use mailpost_core::{
    OutgoingMessage, SmtpConfig, TcpTransport, Transport, dispatch_with, send_email,
    send_email_with,
};
use mailpost_mime::encoding::decode_base64;
use mailpost_mime::{Headers, split_raw};
use mailpost_smtp::TlsVerification;
use mailpost_smtp::connection::{SmtpStream, connect, connect_tls};

const HANDSHAKE_FAILED: &str = "<handshake failed>";

/// What the fake relay saw in one connection.
#[derive(Debug, Default, Clone)]
struct Session {
    commands: Vec<String>,
    data: Option<String>,
}

#[derive(Clone)]
enum RelayTls {
    Off,
    StartTls(TlsAcceptor),
    Implicit(TlsAcceptor),
}

#[derive(Clone)]
struct RelayBehavior {
    advertise_auth: bool,
    reject_rcpt: Option<&'static str>,
    tls: RelayTls,
}

impl Default for RelayBehavior {
    fn default() -> Self {
        Self {
            advertise_auth: true,
            reject_rcpt: None,
            tls: RelayTls::Off,
        }
    }
}

fn self_signed_acceptor() -> TlsAcceptor {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
            .unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

struct FakeRelay {
    port: u16,
    sessions: Arc<Mutex<Vec<Session>>>,
}

impl FakeRelay {
    async fn start(behavior: RelayBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let sessions = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&sessions);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let recorded = Arc::clone(&recorded);
                let behavior = behavior.clone();
                tokio::spawn(async move {
                    let session = handle(socket, &behavior).await;
                    recorded.lock().unwrap().push(session);
                });
            }
        });

        Self { port, sessions }
    }

    /// Waits for the relay to finish recording `n` sessions.
    async fn sessions(&self, n: usize) -> Vec<Session> {
        for _ in 0..200 {
            {
                let sessions = self.sessions.lock().unwrap();
                if sessions.len() >= n {
                    return sessions.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("relay recorded fewer than {n} sessions");
    }
}

async fn handle(socket: TcpStream, behavior: &RelayBehavior) -> Session {
    let mut session = Session::default();
    match &behavior.tls {
        RelayTls::Off => {
            converse(BufReader::new(socket), behavior, true, false, &mut session).await;
        }
        RelayTls::Implicit(acceptor) => match acceptor.accept(socket).await {
            Ok(tls) => {
                converse(BufReader::new(tls), behavior, true, false, &mut session).await;
            }
            Err(_) => session.commands.push(HANDSHAKE_FAILED.to_string()),
        },
        RelayTls::StartTls(acceptor) => {
            let upgraded =
                converse(BufReader::new(socket), behavior, true, true, &mut session).await;
            if let Some(plain) = upgraded {
                match acceptor.accept(plain).await {
                    Ok(tls) => {
                        converse(BufReader::new(tls), behavior, false, false, &mut session)
                            .await;
                    }
                    Err(_) => session.commands.push(HANDSHAKE_FAILED.to_string()),
                }
            }
        }
    }
    session
}

async fn reply<S: AsyncWrite + Unpin>(stream: &mut S, text: &str) {
    let _ = stream.write_all(text.as_bytes()).await;
    let _ = stream.flush().await;
}

/// Answers commands until QUIT or EOF. On STARTTLS, sends `220` and hands the
/// raw stream back for the handshake.
async fn converse<S>(
    mut stream: BufReader<S>,
    behavior: &RelayBehavior,
    greet: bool,
    offer_starttls: bool,
    session: &mut Session,
) -> Option<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if greet {
        reply(&mut stream, "220 fake.relay ESMTP\r\n").await;
    }
    loop {
        let mut line = String::new();
        if stream.read_line(&mut line).await.unwrap_or(0) == 0 {
            return None;
        }
        let command = line.trim_end_matches("\r\n").to_string();
        session.commands.push(command.clone());
        let verb = command
            .split([' ', ':'])
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        match verb.as_str() {
            "EHLO" => {
                let mut lines = vec!["fake.relay"];
                if offer_starttls {
                    lines.push("STARTTLS");
                }
                if behavior.advertise_auth {
                    lines.push("AUTH PLAIN LOGIN");
                }
                lines.push("8BITMIME");
                let last = lines.len() - 1;
                let text: String = lines
                    .iter()
                    .enumerate()
                    .map(|(i, l)| format!("250{}{l}\r\n", if i == last { ' ' } else { '-' }))
                    .collect();
                reply(&mut stream, &text).await;
            }
            "STARTTLS" if offer_starttls => {
                reply(&mut stream, "220 2.0.0 Ready to start TLS\r\n").await;
                return Some(stream.into_inner());
            }
            "AUTH" => reply(&mut stream, "235 2.7.0 Authentication successful\r\n").await,
            "MAIL" => reply(&mut stream, "250 2.1.0 OK\r\n").await,
            "RCPT" => match behavior.reject_rcpt {
                Some(rejected) if command.contains(rejected) => {
                    let text = format!("550 5.1.1 <{rejected}>: Recipient address rejected\r\n");
                    reply(&mut stream, &text).await;
                }
                _ => reply(&mut stream, "250 2.1.5 OK\r\n").await,
            },
            "DATA" => {
                reply(&mut stream, "354 End data with <CR><LF>.<CR><LF>\r\n").await;
                let mut data = String::new();
                loop {
                    let mut data_line = String::new();
                    if stream.read_line(&mut data_line).await.unwrap_or(0) == 0
                        || data_line == ".\r\n"
                    {
                        break;
                    }
                    data.push_str(&data_line);
                }
                session.data = Some(data);
                reply(&mut stream, "250 2.0.0 Queued as 42\r\n").await;
            }
            "QUIT" => {
                reply(&mut stream, "221 2.0.0 Bye\r\n").await;
                return None;
            }
            _ => reply(&mut stream, "500 5.5.2 Unknown command\r\n").await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Path {
    Plain(String, u16),
    ImplicitTls(String, u16, TlsVerification),
}

/// Records the requested path, then connects to the fake relay.
struct RecordingTransport {
    relay_port: u16,
    real_tls: bool,
    calls: Mutex<Vec<Path>>,
}

impl RecordingTransport {
    fn new(relay_port: u16) -> Self {
        Self {
            relay_port,
            real_tls: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Performs a real handshake on the implicit-TLS path.
    fn with_real_tls(relay_port: u16) -> Self {
        Self {
            real_tls: true,
            ..Self::new(relay_port)
        }
    }

    fn calls(&self) -> Vec<Path> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn connect_plain(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = mailpost_smtp::Result<SmtpStream>> + Send {
        self.calls
            .lock()
            .unwrap()
            .push(Path::Plain(host.to_string(), port));
        connect("127.0.0.1", self.relay_port, timeout)
    }

    fn connect_implicit_tls(
        &self,
        host: &str,
        port: u16,
        verification: TlsVerification,
        timeout: Duration,
    ) -> impl Future<Output = mailpost_smtp::Result<SmtpStream>> + Send {
        self.calls
            .lock()
            .unwrap()
            .push(Path::ImplicitTls(host.to_string(), port, verification));
        let (relay_port, real_tls) = (self.relay_port, self.real_tls);
        async move {
            if real_tls {
                connect_tls("127.0.0.1", relay_port, verification, timeout).await
            } else {
                connect("127.0.0.1", relay_port, timeout).await
            }
        }
    }
}

fn config(port: u16) -> SmtpConfig {
    SmtpConfig {
        host: "127.0.0.1".into(),
        port,
        username: "mailer".into(),
        password: "s3cret".into(),
        from: "noreply@example.com".into(),
        from_name: "Notifier".into(),
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(5),
        ..SmtpConfig::default()
    }
}

fn message() -> OutgoingMessage {
    OutgoingMessage::new("Build finished", "All green.\n.\nBye")
        .to("dev@example.com")
        .cc("ops@example.com")
}

#[tokio::test]
async fn test_send_over_submission_port_succeeds() {
    let relay = FakeRelay::start(RelayBehavior::default()).await;
    let transport = RecordingTransport::new(relay.port);

    let outcome = send_email_with(&transport, &config(587), &message()).await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(
        transport.calls(),
        vec![Path::Plain("127.0.0.1".into(), 587)]
    );

    let session = relay.sessions(1).await.remove(0);
    assert_eq!(
        session.commands,
        vec![
            "EHLO localhost",
            "AUTH PLAIN AG1haWxlcgBzM2NyZXQ=",
            "MAIL FROM:<noreply@example.com>",
            "RCPT TO:<dev@example.com>",
            "RCPT TO:<ops@example.com>",
            "DATA",
            "QUIT",
        ]
    );

    let data = session.data.unwrap();
    let (head, body) = split_raw(data.as_bytes()).unwrap();
    let headers = Headers::parse(std::str::from_utf8(head).unwrap());
    assert_eq!(headers.get("To"), Some("dev@example.com"));
    assert_eq!(headers.get("Cc"), Some("ops@example.com"));
    assert!(headers.get("Message-ID").unwrap().ends_with("@127.0.0.1>"));

    let encoded: String = std::str::from_utf8(body).unwrap().split("\r\n").collect();
    assert_eq!(decode_base64(&encoded).unwrap(), b"All green.\n.\nBye");
}

#[tokio::test]
async fn test_port_465_selects_implicit_tls() {
    let relay = FakeRelay::start(RelayBehavior::default()).await;
    let transport = RecordingTransport::new(relay.port);
    let config = SmtpConfig {
        tls_verification: TlsVerification::SkipVerification,
        ..config(465)
    };

    let outcome = send_email_with(&transport, &config, &message()).await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(
        transport.calls(),
        vec![Path::ImplicitTls(
            "127.0.0.1".into(),
            465,
            TlsVerification::SkipVerification
        )]
    );
}

#[tokio::test]
async fn test_port_25_and_host_suffix_select_plaintext() {
    let relay = FakeRelay::start(RelayBehavior::default()).await;
    let transport = RecordingTransport::new(relay.port);

    assert!(send_email_with(&transport, &config(25), &message()).await.is_success());

    let suffixed = SmtpConfig {
        host: "127.0.0.1:2525".into(),
        ..config(465)
    };
    assert!(send_email_with(&transport, &suffixed, &message()).await.is_success());

    assert_eq!(
        transport.calls(),
        vec![
            Path::Plain("127.0.0.1".into(), 25),
            Path::Plain("127.0.0.1".into(), 2525),
        ]
    );
}

#[tokio::test]
async fn test_rejected_recipient_fails_with_reply_text() {
    let relay = FakeRelay::start(RelayBehavior {
        reject_rcpt: Some("ops@example.com"),
        ..RelayBehavior::default()
    })
    .await;
    let transport = RecordingTransport::new(relay.port);

    let outcome = send_email_with(&transport, &config(587), &message()).await;
    assert!(!outcome.is_success());
    let error = outcome.error_message();
    assert!(error.contains("550"), "{error}");
    assert!(error.contains("Recipient address rejected"), "{error}");

    let session = relay.sessions(1).await.remove(0);
    assert!(session.data.is_none());
    assert!(!session.commands.iter().any(|c| c == "DATA"));
}

#[tokio::test]
async fn test_no_recipients_fails_before_connecting() {
    let transport = RecordingTransport::new(1);

    let empty = OutgoingMessage::new("s", "b");
    let outcome = send_email_with(&transport, &config(587), &empty).await;
    assert_eq!(outcome.error_message(), "recipient list is empty");

    let blank = OutgoingMessage::new("s", "b").to(" \r\n ").cc("ops@example.com");
    let outcome = send_email_with(&transport, &config(587), &blank).await;
    assert_eq!(outcome.error_message(), "recipient list is empty");

    let outcome = dispatch_with(&transport, &config(587), b"x", &[]).await;
    assert_eq!(outcome.error_message(), "recipient list is empty");

    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_missing_host_fails_before_connecting() {
    let transport = RecordingTransport::new(1);
    let config = SmtpConfig {
        host: "  ".into(),
        ..config(587)
    };

    let outcome = send_email_with(&transport, &config, &message()).await;
    assert!(!outcome.is_success());
    assert_eq!(outcome.error_message(), "SMTP host is not configured");
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_no_username_skips_auth() {
    let relay = FakeRelay::start(RelayBehavior {
        advertise_auth: false,
        ..RelayBehavior::default()
    })
    .await;
    let transport = RecordingTransport::new(relay.port);
    let config = SmtpConfig {
        username: String::new(),
        password: String::new(),
        ..config(587)
    };

    let outcome = send_email_with(&transport, &config, &message()).await;
    assert!(outcome.is_success(), "{outcome:?}");

    let session = relay.sessions(1).await.remove(0);
    assert!(!session.commands.iter().any(|c| c.starts_with("AUTH")));
}

#[tokio::test]
async fn test_username_without_server_auth_fails() {
    let relay = FakeRelay::start(RelayBehavior {
        advertise_auth: false,
        ..RelayBehavior::default()
    })
    .await;
    let transport = RecordingTransport::new(relay.port);

    let outcome = send_email_with(&transport, &config(587), &message()).await;
    assert!(!outcome.is_success());
    assert_eq!(outcome.error_message(), "Server does not support AUTH");
}

#[tokio::test]
async fn test_plaintext_credentials_to_remote_relay_are_refused() {
    let relay = FakeRelay::start(RelayBehavior::default()).await;
    let transport = RecordingTransport::new(relay.port);
    let config = SmtpConfig {
        host: "relay.example.com".into(),
        ..config(587)
    };

    let outcome = send_email_with(&transport, &config, &message()).await;
    assert!(!outcome.is_success());
    assert!(
        outcome.error_message().contains("unencrypted connection"),
        "{outcome:?}"
    );

    let session = relay.sessions(1).await.remove(0);
    assert!(!session.commands.iter().any(|c| c.starts_with("AUTH")));
}

#[tokio::test]
async fn test_send_email_over_real_tcp() {
    let relay = FakeRelay::start(RelayBehavior::default()).await;

    let outcome = send_email(&config(relay.port), &message()).await;
    assert!(outcome.is_success(), "{outcome:?}");

    let sessions = relay.sessions(1).await;
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].data.is_some());
}

#[tokio::test]
async fn test_tcp_transport_reports_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let outcome = send_email_with(&TcpTransport, &config(port), &message()).await;
    assert!(!outcome.is_success());
    assert!(outcome.error_message().starts_with("I/O error"), "{outcome:?}");
}

#[tokio::test]
async fn test_starttls_precedes_auth() {
    let relay = FakeRelay::start(RelayBehavior {
        tls: RelayTls::StartTls(self_signed_acceptor()),
        ..RelayBehavior::default()
    })
    .await;
    let transport = RecordingTransport::new(relay.port);
    let config = SmtpConfig {
        host: "relay.example.com".into(),
        tls_verification: TlsVerification::SkipVerification,
        ..config(587)
    };

    let outcome = send_email_with(&transport, &config, &message()).await;
    assert!(outcome.is_success(), "{outcome:?}");

    let session = relay.sessions(1).await.remove(0);
    assert_eq!(
        session.commands,
        vec![
            "EHLO localhost",
            "STARTTLS",
            "EHLO localhost",
            "AUTH PLAIN AG1haWxlcgBzM2NyZXQ=",
            "MAIL FROM:<noreply@example.com>",
            "RCPT TO:<dev@example.com>",
            "RCPT TO:<ops@example.com>",
            "DATA",
            "QUIT",
        ]
    );
    assert!(session.data.is_some());
}

#[tokio::test]
async fn test_failed_starttls_handshake_fails_send() {
    let relay = FakeRelay::start(RelayBehavior {
        tls: RelayTls::StartTls(self_signed_acceptor()),
        ..RelayBehavior::default()
    })
    .await;
    let transport = RecordingTransport::new(relay.port);
    let config = SmtpConfig {
        host: "relay.example.com".into(),
        ..config(587)
    };
    assert_eq!(config.tls_verification, TlsVerification::Verified);

    let outcome = send_email_with(&transport, &config, &message()).await;
    assert!(!outcome.is_success());
    assert!(!outcome.error_message().is_empty());

    let session = relay.sessions(1).await.remove(0);
    assert_eq!(
        session.commands,
        vec!["EHLO localhost", "STARTTLS", HANDSHAKE_FAILED]
    );
    assert!(session.data.is_none());
}

#[tokio::test]
async fn test_implicit_tls_handshake_on_port_465() {
    let relay = FakeRelay::start(RelayBehavior {
        tls: RelayTls::Implicit(self_signed_acceptor()),
        ..RelayBehavior::default()
    })
    .await;
    let transport = RecordingTransport::with_real_tls(relay.port);

    let trusting = SmtpConfig {
        tls_verification: TlsVerification::SkipVerification,
        ..config(465)
    };
    let outcome = send_email_with(&transport, &trusting, &message()).await;
    assert!(outcome.is_success(), "{outcome:?}");

    let outcome = send_email_with(&transport, &config(465), &message()).await;
    assert!(!outcome.is_success());

    let sessions = relay.sessions(2).await;
    let accepted = sessions.iter().find(|s| s.data.is_some()).unwrap();
    assert_eq!(accepted.commands[0], "EHLO localhost");
    assert!(!accepted.commands.iter().any(|c| c == "STARTTLS"));
    assert!(
        sessions
            .iter()
            .any(|s| s.commands == vec![HANDSHAKE_FAILED.to_string()])
    );
}
