use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::address::Address;
use crate::error::{Error, Result};
use crate::sasl::{client_handshake, AuthModes, Keyring, SaslClient};
use crate::transport::Transport;

use super::Connection;

/// Default timeout of the authentication handshake.
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout of a method call.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(25);

enum Target {
    Session,
    System,
    Address(Address),
}

/// Builder of a [`Connection`].
pub struct ConnectionBuilder {
    target: Target,
    modes: Option<AuthModes>,
    auth: bool,
    keyring_dir: Option<PathBuf>,
    auth_timeout: Duration,
    call_timeout: Duration,
    hello: bool,
}

impl ConnectionBuilder {
    /// Construct a new connection builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::ConnectionBuilder;
    ///
    /// let c = ConnectionBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            target: Target::Session,
            modes: None,
            auth: true,
            keyring_dir: None,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            hello: true,
        }
    }

    /// Connect to the session bus (default).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tokio_dbus_wire::ConnectionBuilder;
    ///
    /// # #[tokio::main] async fn main() -> tokio_dbus_wire::Result<()> {
    /// let c = ConnectionBuilder::new().session_bus().build().await?;
    /// # Ok(()) }
    /// ```
    pub fn session_bus(&mut self) -> &mut Self {
        self.target = Target::Session;
        self
    }

    /// Connect to the system bus.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tokio_dbus_wire::ConnectionBuilder;
    ///
    /// # #[tokio::main] async fn main() -> tokio_dbus_wire::Result<()> {
    /// let c = ConnectionBuilder::new().system_bus().build().await?;
    /// # Ok(()) }
    /// ```
    pub fn system_bus(&mut self) -> &mut Self {
        self.target = Target::System;
        self
    }

    /// Connect to the given address.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tokio_dbus_wire::{Address, ConnectionBuilder};
    ///
    /// # #[tokio::main] async fn main() -> tokio_dbus_wire::Result<()> {
    /// let address: Address = "unix:path=/tmp/bus".parse()?;
    /// let c = ConnectionBuilder::new().address(address).build().await?;
    /// # Ok(()) }
    /// ```
    pub fn address(&mut self, address: Address) -> &mut Self {
        self.target = Target::Address(address);
        self
    }

    /// Override the mechanisms offered during authentication.
    ///
    /// By default Unix sockets try every mechanism, while TCP only uses
    /// `DBUS_COOKIE_SHA1` since credentials can't be passed.
    pub fn mechanisms(&mut self, modes: AuthModes) -> &mut Self {
        self.modes = Some(modes);
        self
    }

    /// Skip authentication and go straight to `BEGIN`.
    ///
    /// Only useful against peers which don't require authentication.
    pub fn no_auth(&mut self) -> &mut Self {
        self.auth = false;
        self
    }

    /// Use the keyring in the given directory for `DBUS_COOKIE_SHA1`.
    pub fn keyring_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.keyring_dir = Some(dir.into());
        self
    }

    /// The time authentication may take before it fails.
    pub fn auth_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.auth_timeout = timeout;
        self
    }

    /// The default timeout of [`Connection::call`].
    pub fn call_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.call_timeout = timeout;
        self
    }

    /// Whether to call `Hello` once connected (default `true`).
    ///
    /// Peer to peer connections which don't talk to a bus should disable
    /// this.
    pub fn hello(&mut self, hello: bool) -> &mut Self {
        self.hello = hello;
        self
    }

    /// Connect, authenticate and construct a [`Connection`] with the current
    /// configuration.
    pub async fn build(&self) -> Result<Connection> {
        let address = match &self.target {
            Target::Session => Address::session_bus()?,
            Target::System => Address::system_bus()?,
            Target::Address(address) => address.clone(),
        };

        let mut transport = Transport::connect(&address).await?;

        let (guid, leftover) = if self.auth {
            let modes = match self.modes {
                Some(modes) => modes,
                None if transport.is_unix() => AuthModes::ALL,
                None => AuthModes::COOKIE_SHA1,
            };

            let mut client = SaslClient::new(modes);

            if let Some(dir) = &self.keyring_dir {
                client = client.with_keyring(Keyring::new(dir));
            }

            let (guid, leftover) =
                client_handshake(transport.stream_mut(), client, self.auth_timeout).await?;

            if let Some(expected) = address.guid() {
                if expected != guid {
                    return Err(Error::authentication_failed(format!(
                        "server GUID {guid} does not match {expected}"
                    )));
                }
            }

            (Some(guid), leftover)
        } else {
            transport.stream_mut().write_all(b"\0BEGIN\r\n").await?;
            (None, Vec::new())
        };

        let mut c = Connection::spawn(transport.into_stream(), leftover, guid, self.call_timeout);

        if self.hello {
            c.hello().await?;
        }

        Ok(c)
    }
}

impl Default for ConnectionBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
