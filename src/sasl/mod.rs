//! Types related to SASL authentication which D-Bus performs.
//!
//! The line-oriented exchange is modelled as two pure state machines,
//! [`SaslClient`] and [`SaslServer`], which consume parsed [`Command`]s and
//! tell the caller what to send next. Driving them over a socket is the job of
//! the connection and broker.


pub use self::client::{ClientStep, SaslClient};
mod client;

pub use self::server::{SaslServer, ServerStep};
mod server;

pub use self::keyring::Keyring;
pub(crate) use self::keyring::COOKIE_CONTEXT;
mod keyring;

#[cfg(feature = "tokio")]
pub(crate) use self::handshake::{client_handshake, server_handshake};
#[cfg(feature = "tokio")]
mod handshake;

use std::fmt;
use std::str::{from_utf8, FromStr};

use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::error::{Error, ErrorKind, Result};

/// The longest line accepted during authentication.
pub(crate) const MAX_LINE_LENGTH: usize = 16 * 1024;

raw_set! {
    /// A set of SASL mechanisms.
    #[repr(u8)]
    pub enum AuthModes {
        /// Credentials passed by the operating system over a Unix socket.
        EXTERNAL = 1,
        /// A challenge over a shared secret stored in the user's keyring.
        COOKIE_SHA1 = 2,
    }
}

impl AuthModes {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// All supported mechanisms.
    pub const ALL: Self = Self(Self::EXTERNAL.0 | Self::COOKIE_SHA1.0);

    /// Test if the set contains the given mechanism.
    #[inline]
    pub fn contains(self, mechanism: Mechanism) -> bool {
        self & mechanism.mode()
    }

    /// Iterate over the mechanisms in the set, in order of preference.
    pub fn iter(self) -> impl Iterator<Item = Mechanism> {
        [Mechanism::External, Mechanism::CookieSha1]
            .into_iter()
            .filter(move |m| self.contains(*m))
    }

    /// The space separated names of the mechanisms in the set, as sent in a
    /// `REJECTED` command.
    pub(crate) fn names(self) -> String {
        let mut out = String::new();

        for mechanism in self.iter() {
            if !out.is_empty() {
                out.push(' ');
            }

            out.push_str(mechanism.as_str());
        }

        out
    }
}

/// A single SASL mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Mechanism {
    /// The `EXTERNAL` mechanism.
    External,
    /// The `DBUS_COOKIE_SHA1` mechanism.
    CookieSha1,
}

impl Mechanism {
    /// The name of the mechanism on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Mechanism::External => "EXTERNAL",
            Mechanism::CookieSha1 => "DBUS_COOKIE_SHA1",
        }
    }

    /// Look up a mechanism by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EXTERNAL" => Some(Mechanism::External),
            "DBUS_COOKIE_SHA1" => Some(Mechanism::CookieSha1),
            _ => None,
        }
    }

    #[inline]
    pub(crate) const fn mode(self) -> AuthModes {
        match self {
            Mechanism::External => AuthModes::EXTERNAL,
            Mechanism::CookieSha1 => AuthModes::COOKIE_SHA1,
        }
    }
}

impl fmt::Display for Mechanism {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The GUID identifying a server, sent with `OK`.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::sasl::Guid;
///
/// let guid: Guid = "0123456789abcdef0123456789abcdef".parse()?;
/// assert_eq!(guid.to_string(), "0123456789abcdef0123456789abcdef");
/// assert!("0123".parse::<Guid>().is_err());
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid([u8; 16]);

impl Guid {
    /// Generate a new random GUID.
    pub fn generate() -> Self {
        let mut bytes = [0; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Construct a GUID from raw bytes.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// The raw bytes of the GUID.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0; 16];

        if hex::decode_to_slice(s, &mut bytes).is_err() {
            return Err(Error::new(ErrorKind::InvalidGuid));
        }

        Ok(Self(bytes))
    }
}

impl fmt::Display for Guid {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Guid {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Guid").field(&format_args!("{self}")).finish()
    }
}

/// A single SASL command.
///
/// Commands are parsed from and formatted to lines without the trailing
/// `\r\n`.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::sasl::Command;
///
/// let command = Command::parse(b"AUTH EXTERNAL 31303030")?;
///
/// assert_eq!(command, Command::Auth(Some("EXTERNAL"), Some("31303030")));
/// assert_eq!(command.to_string(), "AUTH EXTERNAL 31303030");
/// assert_eq!(Command::parse(b"DATA")?, Command::Data(""));
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `AUTH [mechanism [initial-response]]`.
    Auth(Option<&'a str>, Option<&'a str>),
    /// `CANCEL`.
    Cancel,
    /// `BEGIN`.
    Begin,
    /// `DATA <hex>`.
    Data(&'a str),
    /// `ERROR [message]`.
    Error(&'a str),
    /// `NEGOTIATE_UNIX_FD`.
    NegotiateUnixFd,
    /// `REJECTED <mechanisms>`.
    Rejected(&'a str),
    /// `OK <guid>`.
    Ok(&'a str),
    /// `AGREE_UNIX_FD`.
    AgreeUnixFd,
}

impl<'a> Command<'a> {
    /// Parse a single line, with or without its line terminator.
    pub fn parse(line: &'a [u8]) -> Result<Self> {
        let line = crate::utils::trim_end(line);

        let Ok(line) = from_utf8(line) else {
            return Err(Error::new(ErrorKind::InvalidSasl));
        };

        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let command = match command {
            "AUTH" => {
                let mut parts = rest.split_whitespace();
                let mechanism = parts.next();
                let initial = parts.next();

                if parts.next().is_some() {
                    return Err(Error::new(ErrorKind::InvalidSasl));
                }

                Command::Auth(mechanism, initial)
            }
            "CANCEL" => Command::Cancel,
            "BEGIN" => Command::Begin,
            "DATA" => Command::Data(rest),
            "ERROR" => Command::Error(rest),
            "NEGOTIATE_UNIX_FD" => Command::NegotiateUnixFd,
            "REJECTED" => Command::Rejected(rest),
            "OK" => Command::Ok(rest),
            "AGREE_UNIX_FD" => Command::AgreeUnixFd,
            _ => return Err(Error::new(ErrorKind::InvalidSaslResponse)),
        };

        Ok(command)
    }

    /// Iterate over the mechanisms listed in a `REJECTED` command.
    pub fn rejected_mechanisms(&self) -> impl Iterator<Item = &'a str> {
        let list = match *self {
            Command::Rejected(list) => list,
            _ => "",
        };

        list.split_whitespace()
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn with_arg(f: &mut fmt::Formatter<'_>, name: &str, arg: &str) -> fmt::Result {
            if arg.is_empty() {
                f.write_str(name)
            } else {
                write!(f, "{name} {arg}")
            }
        }

        match *self {
            Command::Auth(None, _) => f.write_str("AUTH"),
            Command::Auth(Some(mechanism), None) => write!(f, "AUTH {mechanism}"),
            Command::Auth(Some(mechanism), Some(initial)) => {
                write!(f, "AUTH {mechanism} {initial}")
            }
            Command::Cancel => f.write_str("CANCEL"),
            Command::Begin => f.write_str("BEGIN"),
            Command::Data(data) => with_arg(f, "DATA", data),
            Command::Error(message) => with_arg(f, "ERROR", message),
            Command::NegotiateUnixFd => f.write_str("NEGOTIATE_UNIX_FD"),
            Command::Rejected(list) => with_arg(f, "REJECTED", list),
            Command::Ok(guid) => with_arg(f, "OK", guid),
            Command::AgreeUnixFd => f.write_str("AGREE_UNIX_FD"),
        }
    }
}

/// Format a command as a line ready to be sent.
pub(crate) fn line(command: &Command<'_>) -> String {
    format!("{command}\r\n")
}

/// The identity sent with `EXTERNAL`, which is the decimal uid encoded as
/// hex ascii.
pub(crate) fn external_identity(uid: u32) -> String {
    hex::encode(uid.to_string())
}

/// The uid of the current process.
#[cfg(all(unix, feature = "libc"))]
pub(crate) fn current_uid() -> Result<u32> {
    // SAFETY: getuid has no preconditions and can't fail.
    Ok(unsafe { libc::getuid() })
}

#[cfg(not(all(unix, feature = "libc")))]
pub(crate) fn current_uid() -> Result<u32> {
    Err(Error::new(ErrorKind::UnsupportedAuthUid))
}

/// Generate a random challenge, hex-encoded.
pub(crate) fn random_challenge() -> String {
    let mut bytes = [0; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compute the `DBUS_COOKIE_SHA1` response digest.
pub(crate) fn cookie_digest(server_challenge: &str, client_challenge: &str, cookie: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_challenge.as_bytes());
    hasher.update(b":");
    hasher.update(client_challenge.as_bytes());
    hasher.update(b":");
    hasher.update(cookie.as_bytes());
    hex::encode(hasher.finalize())
}

/// Decode hex-encoded data into a string.
pub(crate) fn decode_hex_str(data: &str) -> Result<String> {
    let Ok(bytes) = hex::decode(data) else {
        return Err(Error::authentication_failed("data is not valid hex"));
    };

    match String::from_utf8(bytes) {
        Ok(string) => Ok(string),
        Err(..) => Err(Error::authentication_failed("data is not valid utf-8")),
    }
}
