//! Relay and sender configuration.

use mailpost_smtp::{IMPLICIT_TLS_PORT, SUBMISSION_PORT, TlsVerification};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Environment variable names read by [`SmtpConfig::from_env`].
pub mod env {
    /// Relay host, optionally with a `:port` suffix.
    pub const HOST: &str = "SMTP_HOST";
    /// Relay port.
    pub const PORT: &str = "SMTP_PORT";
    /// AUTH PLAIN user name.
    pub const USERNAME: &str = "SMTP_USERNAME";
    /// AUTH PLAIN password.
    pub const PASSWORD: &str = "SMTP_PASSWORD";
    /// Envelope-from and `From` address.
    pub const FROM: &str = "SMTP_FROM";
    /// `From` display name.
    pub const FROM_NAME: &str = "SMTP_FROM_NAME";
    /// `1` or `true` disables certificate verification.
    pub const TLS_INSECURE: &str = "SMTP_TLS_INSECURE";
}

/// How the connection to the relay is secured, derived from the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Security {
    /// TLS handshake right after connect (port 465).
    ImplicitTls,
    /// Plaintext connect, upgraded with STARTTLS when the relay offers it.
    StartTls,
}

impl Security {
    /// Selects the transport for a relay port.
    #[must_use]
    pub const fn for_port(port: u16) -> Self {
        if port == IMPLICIT_TLS_PORT {
            Self::ImplicitTls
        } else {
            Self::StartTls
        }
    }

    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::ImplicitTls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }
}

#[allow(dead_code)] // only used through `#[serde(with)]`
#[derive(Serialize, Deserialize)]
#[serde(remote = "TlsVerification", rename_all = "snake_case")]
enum TlsVerificationDef {
    Verified,
    SkipVerification,
}

/// Relay, credentials and sender identity for one send.
///
/// Built fresh per request and passed around by reference or clone.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Relay host name. A numeric `:port` suffix overrides [`Self::port`].
    pub host: String,
    /// Relay port. 465 selects implicit TLS.
    pub port: u16,
    /// AUTH user name; authentication is skipped when empty.
    pub username: String,
    /// AUTH password.
    #[serde(skip_serializing)]
    pub password: String,
    /// Envelope-from address, also used in the `From` header.
    pub from: String,
    /// `From` display name; empty means none.
    pub from_name: String,
    /// Certificate handling on both TLS paths.
    #[serde(with = "TlsVerificationDef")]
    pub tls_verification: TlsVerification,
    /// Bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Bound on each command round-trip and the data transfer.
    pub command_timeout: Duration,
    /// Client name sent in `EHLO`.
    pub helo_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: SUBMISSION_PORT,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            from_name: String::new(),
            tls_verification: TlsVerification::Verified,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            command_timeout: Self::DEFAULT_COMMAND_TIMEOUT,
            helo_name: "localhost".to_string(),
        }
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("from_name", &self.from_name)
            .field("tls_verification", &self.tls_verification)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .field("helo_name", &self.helo_name)
            .finish()
    }
}

impl SmtpConfig {
    /// Default bound on connect plus handshake.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default bound on one command round-trip.
    pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

    /// Reads the configuration from the process environment.
    ///
    /// Every value is trimmed. A missing, unparsable or zero `SMTP_PORT`
    /// falls back to 587.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, keyed by the names in
    /// [`env`].
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };

        let port = get(env::PORT)
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .unwrap_or(SUBMISSION_PORT);
        let insecure = get(env::TLS_INSECURE);
        let tls_verification = if insecure == "1" || insecure.eq_ignore_ascii_case("true") {
            TlsVerification::SkipVerification
        } else {
            TlsVerification::Verified
        };

        Self {
            host: get(env::HOST),
            port,
            username: get(env::USERNAME),
            password: get(env::PASSWORD),
            from: get(env::FROM),
            from_name: get(env::FROM_NAME),
            tls_verification,
            ..Self::default()
        }
    }

    /// Returns a copy with the display name replaced, unless `name` is
    /// blank.
    #[must_use]
    pub fn with_from_name(mut self, name: &str) -> Self {
        let name = name.trim();
        if !name.is_empty() {
            self.from_name = name.to_string();
        }
        self
    }

    /// Returns the relay host name and port to connect to.
    ///
    /// `host:port` and `[v6]:port` suffixes take precedence over the port
    /// field. A bare IPv6 literal is returned unchanged.
    #[must_use]
    pub fn relay(&self) -> (&str, u16) {
        let host = self.host.trim();

        if let Some(rest) = host.strip_prefix('[')
            && let Some((addr, tail)) = rest.split_once(']')
        {
            let port = tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .unwrap_or(self.port);
            return (addr, port);
        }

        match host.split_once(':') {
            Some((name, suffix)) if !suffix.contains(':') => {
                (name, suffix.parse().unwrap_or(self.port))
            }
            _ => (host, self.port),
        }
    }

    /// Returns the relay host name without any port suffix.
    #[must_use]
    pub fn relay_host(&self) -> &str {
        self.relay().0
    }

    /// Returns the transport chosen for the effective relay port.
    #[must_use]
    pub fn security(&self) -> Security {
        Security::for_port(self.relay().1)
    }
}
