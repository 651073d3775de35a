//! Service extensions advertised after `EHLO` (RFC 5321 section 4.1.1.1).

/// One capability line of an `EHLO` reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// `STARTTLS` (RFC 3207)
    StartTls,
    /// `AUTH` (RFC 4954) with the mechanisms this client understands
    Auth(Vec<AuthMechanism>),
    /// `SIZE` (RFC 1870); `None` when no limit value was given
    Size(Option<usize>),
    /// `8BITMIME`
    EightBitMime,
    /// `PIPELINING`
    Pipelining,
    /// `SMTPUTF8`
    SmtpUtf8,
    /// `ENHANCEDSTATUSCODES` (RFC 2034)
    EnhancedStatusCodes,
    /// Any other keyword, with the line kept as received
    Unknown(String),
}

impl Extension {
    /// Parses a capability line. Keywords are case-insensitive.
    ///
    /// The obsolete `AUTH=LOGIN PLAIN` form is read like `AUTH LOGIN PLAIN`.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Self::Unknown(line.to_string());
        };
        let (keyword, first_arg) = head
            .split_once('=')
            .map_or((head, None), |(keyword, arg)| (keyword, Some(arg)));
        let mut args = first_arg.into_iter().chain(words);

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(args.filter_map(AuthMechanism::from_name).collect()),
            "SIZE" => Self::Size(args.next().and_then(|limit| limit.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            "ENHANCEDSTATUSCODES" => Self::EnhancedStatusCodes,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL mechanism named in an `AUTH` capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// RFC 4616
    Plain,
    /// Non-standard, still widely advertised
    Login,
    /// RFC 2195
    CramMd5,
}

const MECHANISM_NAMES: [(AuthMechanism, &str); 3] = [
    (AuthMechanism::Plain, "PLAIN"),
    (AuthMechanism::Login, "LOGIN"),
    (AuthMechanism::CramMd5, "CRAM-MD5"),
];

impl AuthMechanism {
    /// Looks up a mechanism by its registered name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        MECHANISM_NAMES
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(name))
            .map(|(mechanism, _)| *mechanism)
    }

    /// Registered name, as sent in `AUTH`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
        }
    }
}
