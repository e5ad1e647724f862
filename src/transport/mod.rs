//! Unix and TCP byte streams which messages are exchanged over.

#[cfg(test)]
mod tests;

pub use self::listener::Listener;
mod listener;

pub use self::close_handle::CloseHandle;
mod close_handle;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, Interest, ReadBuf, Ready};
use tokio::net::{TcpStream, UnixStream};

use crate::address::{Address, AddressKind};
use crate::error::Result;

/// An established connection to a peer.
///
/// A transport carries the raw byte stream, first for authentication and
/// then for messages.
#[derive(Debug)]
pub struct Transport {
    stream: Stream,
}

impl Transport {
    /// Establish a transport to the given address.
    ///
    /// If the address has the `listen` parameter, this binds to it and waits
    /// for a single peer to connect instead.
    pub async fn connect(address: &Address) -> Result<Self> {
        if address.is_listen() {
            let listener = Listener::bind(address).await?;
            let transport = listener.accept().await?;
            return Ok(transport);
        }

        let stream = match address.kind() {
            AddressKind::UnixPath(path) => {
                tracing::debug!(?path, "connecting");
                Stream::Unix(UnixStream::connect(path).await?)
            }
            AddressKind::UnixAbstract(name) => Stream::Unix(connect_abstract(name)?),
            AddressKind::Tcp { host, port } => {
                tracing::debug!(host = &**host, port, "connecting");
                let stream = TcpStream::connect((&**host, *port)).await?;
                stream.set_nodelay(true)?;
                Stream::Tcp(stream)
            }
        };

        let transport = Self { stream };
        transport.pass_credentials()?;
        Ok(transport)
    }

    pub(crate) fn from_stream(stream: Stream) -> Self {
        Self { stream }
    }

    /// Test if the transport is a Unix socket.
    pub fn is_unix(&self) -> bool {
        matches!(self.stream, Stream::Unix(..))
    }

    /// The uid of the peer as reported by the operating system.
    ///
    /// This is only available for Unix sockets.
    pub fn peer_uid(&self) -> Option<u32> {
        match &self.stream {
            Stream::Unix(stream) => stream.peer_cred().ok().map(|cred| cred.uid()),
            Stream::Tcp(..) => None,
        }
    }

    pub(crate) fn stream_mut(&mut self) -> &mut Stream {
        &mut self.stream
    }

    pub(crate) fn into_stream(self) -> Stream {
        self.stream
    }

    /// Ask the kernel to pass credentials over the socket.
    #[cfg(all(target_os = "linux", feature = "libc"))]
    fn pass_credentials(&self) -> Result<()> {
        use std::os::fd::AsRawFd;

        let Stream::Unix(stream) = &self.stream else {
            return Ok(());
        };

        let enable: libc::c_int = 1;

        // SAFETY: The file descriptor is valid for the duration of the call
        // and the option value points to a c_int of the given size.
        let result = unsafe {
            libc::setsockopt(
                stream.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_PASSCRED,
                &enable as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };

        if result != 0 {
            return Err(io::Error::last_os_error().into());
        }

        Ok(())
    }

    #[cfg(not(all(target_os = "linux", feature = "libc")))]
    fn pass_credentials(&self) -> Result<()> {
        Ok(())
    }
}

/// The byte stream of a transport.
#[derive(Debug)]
pub(crate) enum Stream {
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Stream {
    /// Wait for any of the given readiness.
    pub(crate) async fn ready(&self, interest: Interest) -> io::Result<Ready> {
        match self {
            Stream::Unix(stream) => stream.ready(interest).await,
            Stream::Tcp(stream) => stream.ready(interest).await,
        }
    }

    /// Read without blocking.
    pub(crate) fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Unix(stream) => stream.try_read(buf),
            Stream::Tcp(stream) => stream.try_read(buf),
        }
    }

    /// Write without blocking.
    pub(crate) fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Unix(stream) => stream.try_write(buf),
            Stream::Tcp(stream) => stream.try_write(buf),
        }
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
            Stream::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
            Stream::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Unix(stream) => Pin::new(stream).poll_flush(cx),
            Stream::Tcp(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
            Stream::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &[u8]) -> Result<UnixStream> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixStream as StdUnixStream};

    tracing::debug!(name = ?crate::lossy_str::LossyStr::new(name), "connecting to abstract socket");

    let address = SocketAddr::from_abstract_name(name)?;
    let stream = StdUnixStream::connect_addr(&address)?;
    stream.set_nonblocking(true)?;
    Ok(UnixStream::from_std(stream)?)
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_: &[u8]) -> Result<UnixStream> {
    Err(crate::error::Error::new(
        crate::error::ErrorKind::UnsupportedAddress,
    ))
}
