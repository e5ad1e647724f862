use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::address::{Address, AddressKind};
use crate::error::Result;

use super::{CloseHandle, Listener, Transport};

#[tokio::test]
async fn unix_path_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bus");

    let address = Address::unix_path(&path);
    let listener = Listener::bind(&address).await?;
    assert!(listener.address().is_listen());

    let (client, server) = tokio::join!(Transport::connect(&address), listener.accept());
    let mut client = client?;
    let mut server = server?;

    assert!(client.is_unix());
    assert!(server.peer_uid().is_some());

    client.stream_mut().write_all(b"ping").await?;

    let mut buf = [0; 4];
    server.stream_mut().read_exact(&mut buf).await?;
    assert_eq!(&buf, b"ping");
    Ok(())
}

#[tokio::test]
async fn unix_path_is_unlinked() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let address = Address::unix_path(dir.path().join("bus"));

    let listener = Listener::bind(&address).await?;
    assert!(Listener::bind(&address).await.is_err());
    drop(listener);

    let listener = Listener::bind(&address).await?;
    drop(listener);
    Ok(())
}

#[tokio::test]
async fn tcp_ephemeral_port() -> Result<()> {
    let listener = Listener::bind(&Address::tcp("127.0.0.1", 0)).await?;

    let AddressKind::Tcp { port, .. } = listener.address().kind() else {
        panic!("expected a tcp address");
    };

    assert_ne!(*port, 0);

    let address = Address::tcp("127.0.0.1", *port);
    let (client, server) = tokio::join!(Transport::connect(&address), listener.accept());
    let client = client?;
    let server = server?;

    assert!(!client.is_unix());
    assert_eq!(server.peer_uid(), None);
    Ok(())
}

#[tokio::test]
async fn connect_with_listen_accepts_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bus");

    let server = tokio::spawn({
        let address = Address::unix_path(&path).with_listen(true);
        async move { Transport::connect(&address).await }
    });

    let mut client = loop {
        match Transport::connect(&Address::unix_path(&path)).await {
            Ok(client) => break client,
            Err(..) => tokio::task::yield_now().await,
        }
    };

    let mut server = server.await.map_err(std::io::Error::other)??;
    server.stream_mut().write_all(b"hi").await?;

    let mut buf = [0; 2];
    client.stream_mut().read_exact(&mut buf).await?;
    assert_eq!(&buf, b"hi");

    // The listener is gone once the peer has been accepted.
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn close_handle_wakes_waiters() {
    let handle = CloseHandle::new();

    let waiter = tokio::spawn({
        let handle = handle.clone();
        async move { handle.closed().await }
    });

    handle.close();
    handle.close();

    assert!(waiter.await.is_ok());
    assert!(handle.is_closed());
}
