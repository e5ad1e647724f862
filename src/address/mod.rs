//! Parsing and formatting of D-Bus server addresses.

#[cfg(test)]
mod tests;

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};
use crate::sasl::Guid;

const ENV_STARTER_BUS: &str = "DBUS_STARTER_ADDRESS";
const ENV_SESSION_BUS: &str = "DBUS_SESSION_BUS_ADDRESS";
const ENV_SYSTEM_BUS: &str = "DBUS_SYSTEM_BUS_ADDRESS";
const DEFAULT_SYSTEM_BUS: &str = "unix:path=/var/run/dbus/system_bus_socket";

/// The transport of an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AddressKind {
    /// A Unix socket bound to a filesystem path.
    UnixPath(PathBuf),
    /// A Unix socket in the abstract namespace.
    UnixAbstract(Box<[u8]>),
    /// A TCP socket.
    Tcp {
        /// The host name or ip address.
        host: Box<str>,
        /// The port, where `0` while listening picks any free port.
        port: u16,
    },
}

/// A single D-Bus server address, like `unix:path=/run/bus` or
/// `tcp:host=localhost,port=4000,listen=1`.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::{Address, AddressKind};
///
/// let address: Address = "unix:path=/tmp/dbus%20test,listen=1".parse()?;
/// assert!(address.is_listen());
/// assert!(matches!(address.kind(), AddressKind::UnixPath(path) if path.to_str() == Some("/tmp/dbus test")));
/// assert_eq!(address.to_string(), "unix:path=/tmp/dbus%20test,listen=1");
///
/// // The first usable address in a list is picked.
/// let address: Address = "launchd:env=FOO;tcp:host=localhost,port=4000".parse()?;
/// assert!(matches!(address.kind(), AddressKind::Tcp { port: 4000, .. }));
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    kind: AddressKind,
    listen: bool,
    guid: Option<Guid>,
}

impl Address {
    /// Construct an address for a Unix socket at the given path.
    pub fn unix_path(path: impl Into<PathBuf>) -> Self {
        Self::new(AddressKind::UnixPath(path.into()))
    }

    /// Construct an address for a Unix socket in the abstract namespace.
    pub fn unix_abstract(name: impl AsRef<[u8]>) -> Self {
        Self::new(AddressKind::UnixAbstract(name.as_ref().into()))
    }

    /// Construct an address for a TCP socket.
    pub fn tcp(host: &str, port: u16) -> Self {
        Self::new(AddressKind::Tcp {
            host: host.into(),
            port,
        })
    }

    fn new(kind: AddressKind) -> Self {
        Self {
            kind,
            listen: false,
            guid: None,
        }
    }

    /// Set whether the address should be listened on rather than connected
    /// to.
    pub fn with_listen(self, listen: bool) -> Self {
        Self { listen, ..self }
    }

    /// Set the GUID of the server at the address.
    pub fn with_guid(self, guid: Guid) -> Self {
        Self {
            guid: Some(guid),
            ..self
        }
    }

    /// The transport of the address.
    pub fn kind(&self) -> &AddressKind {
        &self.kind
    }

    /// Test if the address has the `listen` parameter.
    pub fn is_listen(&self) -> bool {
        self.listen
    }

    /// The `guid` parameter of the address.
    pub fn guid(&self) -> Option<Guid> {
        self.guid
    }

    /// Test if the address is a Unix socket.
    pub fn is_unix(&self) -> bool {
        matches!(
            self.kind,
            AddressKind::UnixPath(..) | AddressKind::UnixAbstract(..)
        )
    }

    /// Parse a `;` separated list of addresses, skipping the ones with a
    /// transport which isn't supported.
    ///
    /// # Errors
    ///
    /// Errors if any entry is malformed.
    pub fn parse_list(string: &str) -> Result<Vec<Address>> {
        let mut out = Vec::new();

        for entry in string.split(';') {
            if entry.is_empty() {
                continue;
            }

            match parse_entry(entry)? {
                Some(address) => out.push(address),
                None => {
                    tracing::debug!(entry, "skipping unsupported address");
                }
            }
        }

        Ok(out)
    }

    /// Parse the first usable address from a `;` separated list.
    pub fn parse(string: &str) -> Result<Address> {
        match Self::parse_list(string)?.into_iter().next() {
            Some(address) => Ok(address),
            None => Err(Error::new(ErrorKind::UnsupportedAddress)),
        }
    }

    /// The address of the session bus, from `DBUS_STARTER_ADDRESS` or
    /// `DBUS_SESSION_BUS_ADDRESS`.
    pub fn session_bus() -> Result<Address> {
        from_env(&[ENV_STARTER_BUS, ENV_SESSION_BUS], None, |name| {
            env::var(name).ok()
        })
    }

    /// The address of the system bus, from `DBUS_STARTER_ADDRESS` or
    /// `DBUS_SYSTEM_BUS_ADDRESS`, falling back to
    /// `unix:path=/var/run/dbus/system_bus_socket`.
    pub fn system_bus() -> Result<Address> {
        from_env(
            &[ENV_STARTER_BUS, ENV_SYSTEM_BUS],
            Some(DEFAULT_SYSTEM_BUS),
            |name| env::var(name).ok(),
        )
    }
}

impl FromStr for Address {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AddressKind::UnixPath(path) => {
                f.write_str("unix:path=")?;
                escape(f, path_bytes(path))?;
            }
            AddressKind::UnixAbstract(name) => {
                f.write_str("unix:abstract=")?;
                escape(f, name)?;
            }
            AddressKind::Tcp { host, port } => {
                f.write_str("tcp:host=")?;
                escape(f, host.as_bytes())?;
                write!(f, ",port={port}")?;
            }
        }

        if self.listen {
            f.write_str(",listen=1")?;
        }

        if let Some(guid) = &self.guid {
            write!(f, ",guid={guid}")?;
        }

        Ok(())
    }
}

pub(crate) fn from_env<F>(names: &[&str], default: Option<&str>, get: F) -> Result<Address>
where
    F: Fn(&str) -> Option<String>,
{
    for name in names {
        if let Some(value) = get(name) {
            tracing::trace!(name, value, "bus address from environment");
            return Address::parse(&value);
        }
    }

    match default {
        Some(default) => Address::parse(default),
        None => Err(Error::new(ErrorKind::MissingBus)),
    }
}

/// Parse a single `transport:key=value,...` entry, returning `None` if the
/// transport is not supported.
fn parse_entry(entry: &str) -> Result<Option<Address>> {
    let Some((transport, params)) = entry.split_once(':') else {
        return Err(Error::new(ErrorKind::InvalidAddress));
    };

    let mut path = None;
    let mut abstract_name = None;
    let mut host = None;
    let mut port = None;
    let mut listen = false;
    let mut guid = None;

    for param in params.split(',') {
        if param.is_empty() {
            continue;
        }

        let Some((key, value)) = param.split_once('=') else {
            return Err(Error::new(ErrorKind::InvalidAddress));
        };

        let value = unescape(value)?;

        match key {
            "path" => path = Some(value),
            "abstract" => abstract_name = Some(value),
            "host" => host = Some(value),
            "port" => port = Some(value),
            "listen" => listen = true,
            "guid" => guid = Some(value),
            _ => {}
        }
    }

    let kind = match transport {
        "unix" => match (path, abstract_name) {
            (Some(path), None) => match String::from_utf8(path) {
                Ok(path) => AddressKind::UnixPath(PathBuf::from(path)),
                Err(..) => return Err(Error::new(ErrorKind::InvalidAddress)),
            },
            (None, Some(name)) => AddressKind::UnixAbstract(name.into()),
            _ => return Err(Error::new(ErrorKind::InvalidAddress)),
        },
        "tcp" => {
            let host = match host {
                Some(host) => match String::from_utf8(host) {
                    Ok(host) => host.into(),
                    Err(..) => return Err(Error::new(ErrorKind::InvalidAddress)),
                },
                None => "localhost".into(),
            };

            let port = match port {
                Some(port) => match std::str::from_utf8(&port).ok().and_then(|p| p.parse().ok()) {
                    Some(port) => port,
                    None => return Err(Error::new(ErrorKind::InvalidAddress)),
                },
                None if listen => 0,
                None => return Err(Error::new(ErrorKind::InvalidAddress)),
            };

            AddressKind::Tcp { host, port }
        }
        _ => return Ok(None),
    };

    let guid = match guid {
        Some(guid) => match std::str::from_utf8(&guid) {
            Ok(guid) => Some(guid.parse::<Guid>()?),
            Err(..) => return Err(Error::new(ErrorKind::InvalidGuid)),
        },
        None => None,
    };

    Ok(Some(Address { kind, listen, guid }))
}

fn unescape(value: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(value.len());
    let mut bytes = value.bytes();

    while let Some(b) = bytes.next() {
        if b != b'%' {
            out.push(b);
            continue;
        }

        let (Some(hi), Some(lo)) = (bytes.next(), bytes.next()) else {
            return Err(Error::new(ErrorKind::InvalidAddress));
        };

        let mut decoded = [0];

        if hex::decode_to_slice([hi, lo], &mut decoded).is_err() {
            return Err(Error::new(ErrorKind::InvalidAddress));
        }

        out.push(decoded[0]);
    }

    Ok(out)
}

fn escape(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for &b in bytes {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'/' | b'.' | b'\\' | b'*') {
            write!(f, "{}", b as char)?;
        } else {
            write!(f, "%{b:02x}")?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> &[u8] {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> &[u8] {
    path.to_str().map_or(&[], str::as_bytes)
}
