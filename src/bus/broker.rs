use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::address::Address;
use crate::connection::IoLoop;
use crate::error::Result;
use crate::sasl::{server_handshake, AuthModes, Guid, Keyring, SaslServer};
use crate::transport::{CloseHandle, Listener, Transport};

use super::router::{PeerDispatch, Router};

/// Default timeout of the authentication handshake of a peer.
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder of a [`Broker`].
pub struct BrokerBuilder {
    address: Address,
    guid: Option<Guid>,
    keyring_dir: Option<PathBuf>,
    auth_timeout: Duration,
}

impl BrokerBuilder {
    /// Construct a builder of a broker listening on the given address.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tokio_dbus_wire::{Address, BrokerBuilder};
    ///
    /// # #[tokio::main] async fn main() -> tokio_dbus_wire::Result<()> {
    /// let broker = BrokerBuilder::new(Address::unix_path("/tmp/bus")).bind().await?;
    /// println!("listening on {}", broker.local_address());
    /// broker.run().await?;
    /// # Ok(()) }
    /// ```
    pub fn new(address: Address) -> Self {
        Self {
            address,
            guid: None,
            keyring_dir: None,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    /// The GUID of the server.
    ///
    /// Defaults to the `guid` of the address, or a random one.
    pub fn guid(&mut self, guid: Guid) -> &mut Self {
        self.guid = Some(guid);
        self
    }

    /// Use the keyring in the given directory for `DBUS_COOKIE_SHA1`.
    ///
    /// Defaults to the keyring of the current user.
    pub fn keyring_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.keyring_dir = Some(dir.into());
        self
    }

    /// The time a peer may take to authenticate.
    pub fn auth_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.auth_timeout = timeout;
        self
    }

    /// Bind the listening socket.
    pub async fn bind(&self) -> Result<Broker> {
        let guid = self
            .guid
            .or(self.address.guid())
            .unwrap_or_else(Guid::generate);

        let listener = Listener::bind(&self.address).await?;
        let address = listener.address().clone().with_listen(false).with_guid(guid);

        let keyring = match &self.keyring_dir {
            Some(dir) => Some(Keyring::new(dir)),
            None => Keyring::user(),
        };

        tracing::debug!(%address, "broker bound");

        Ok(Broker {
            listener,
            address,
            guid,
            keyring,
            auth_timeout: self.auth_timeout,
            router: Arc::new(Router::new(guid)),
            close: CloseHandle::new(),
        })
    }
}

/// An embedded message bus routing messages between its peers.
pub struct Broker {
    listener: Listener,
    address: Address,
    guid: Guid,
    keyring: Option<Keyring>,
    auth_timeout: Duration,
    router: Arc<Router>,
    close: CloseHandle,
}

impl Broker {
    /// The address the broker listens on, including its GUID.
    ///
    /// Clients connect to this address without the `listen` parameter.
    pub fn local_address(&self) -> &Address {
        &self.address
    }

    /// The GUID of the broker.
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// A handle which stops the broker and closes every peer.
    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Accept and serve peers until closed.
    pub async fn run(self) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.close.closed() => {
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok(transport) => self.spawn_peer(transport),
                        Err(error) => tracing::warn!(%error, "failed to accept peer"),
                    }
                }
            }
        }

        tracing::debug!("broker closed");
        self.router.close();
        Ok(())
    }

    fn spawn_peer(&self, transport: Transport) {
        let modes = if transport.is_unix() {
            AuthModes::ALL
        } else {
            AuthModes::COOKIE_SHA1
        };

        let mut server = SaslServer::new(self.guid, modes).with_peer_uid(transport.peer_uid());

        if let Some(keyring) = &self.keyring {
            server = server.with_keyring(keyring.clone());
        }

        let router = self.router.clone();
        let timeout = self.auth_timeout;

        tokio::spawn(serve(router, transport, server, timeout));
    }
}

impl Drop for Broker {
    #[inline]
    fn drop(&mut self) {
        self.close.close();
    }
}

async fn serve(router: Arc<Router>, mut transport: Transport, server: SaslServer, timeout: Duration) {
    let leftover = match server_handshake(transport.stream_mut(), server, timeout).await {
        Ok(leftover) => leftover,
        Err(error) => {
            tracing::debug!(%error, "peer failed to authenticate");
            return;
        }
    };

    let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
    let close = CloseHandle::new();

    let Some(id) = router.register(outgoing, close.clone()) else {
        return;
    };

    let dispatch = PeerDispatch { router, id };
    IoLoop::new(transport.into_stream(), leftover, outgoing_rx, close, dispatch)
        .run()
        .await;
}
