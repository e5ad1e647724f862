use std::path::PathBuf;

use tokio::net::{TcpListener, UnixListener};

use crate::address::{Address, AddressKind};
use crate::error::Result;

use super::{Stream, Transport};

#[derive(Debug)]
enum Inner {
    Unix(UnixListener),
    Tcp(TcpListener),
}

/// A socket listening for incoming transports.
///
/// A listener bound to a Unix socket path removes the socket file when
/// dropped, so that the same address can be bound again.
#[derive(Debug)]
pub struct Listener {
    inner: Inner,
    address: Address,
    unlink: Option<PathBuf>,
}

impl Listener {
    /// Bind to the given address.
    ///
    /// The `listen` parameter of the address is implied. Binding TCP port `0`
    /// picks a free port, which is reported through [`Listener::address`].
    pub async fn bind(address: &Address) -> Result<Self> {
        let (inner, local, unlink) = match address.kind() {
            AddressKind::UnixPath(path) => {
                let listener = UnixListener::bind(path)?;
                (Inner::Unix(listener), address.clone(), Some(path.clone()))
            }
            AddressKind::UnixAbstract(name) => {
                let listener = bind_abstract(name)?;
                (Inner::Unix(listener), address.clone(), None)
            }
            AddressKind::Tcp { host, port } => {
                let listener = TcpListener::bind((&**host, *port)).await?;
                let port = listener.local_addr()?.port();
                let mut local = Address::tcp(host, port);

                if let Some(guid) = address.guid() {
                    local = local.with_guid(guid);
                }

                (Inner::Tcp(listener), local, None)
            }
        };

        let address = local.with_listen(true);
        tracing::debug!(%address, "listening");

        Ok(Self {
            inner,
            address,
            unlink,
        })
    }

    /// The address the listener is bound to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Accept the next incoming transport.
    pub async fn accept(&self) -> Result<Transport> {
        let stream = match &self.inner {
            Inner::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Stream::Unix(stream)
            }
            Inner::Tcp(listener) => {
                let (stream, remote) = listener.accept().await?;
                tracing::trace!(%remote, "accepted");
                stream.set_nodelay(true)?;
                Stream::Tcp(stream)
            }
        };

        Ok(Transport::from_stream(stream))
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(path) = self.unlink.take() {
            if let Err(error) = std::fs::remove_file(&path) {
                tracing::warn!(?path, %error, "failed to remove socket");
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn bind_abstract(name: &[u8]) -> Result<UnixListener> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixListener as StdUnixListener};

    let address = SocketAddr::from_abstract_name(name)?;
    let listener = StdUnixListener::bind_addr(&address)?;
    listener.set_nonblocking(true)?;
    Ok(UnixListener::from_std(listener)?)
}

#[cfg(not(target_os = "linux"))]
fn bind_abstract(_: &[u8]) -> Result<UnixListener> {
    Err(crate::error::Error::new(
        crate::error::ErrorKind::UnsupportedAddress,
    ))
}
