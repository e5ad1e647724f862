use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_dbus_wire::org_freedesktop_dbus::{NameFlag, NameReply};
use tokio_dbus_wire::sasl::AuthModes;
use tokio_dbus_wire::{
    Address, BodyBuf, Broker, BrokerBuilder, CloseHandle, Connection, ConnectionBuilder, Message,
    ObjectPath,
};

const PATH: &ObjectPath = ObjectPath::new_const(b"/se/tedro/Test");

struct Running {
    address: Address,
    close: CloseHandle,
    task: JoinHandle<tokio_dbus_wire::Result<()>>,
}

impl Running {
    fn start(broker: Broker) -> Self {
        let address = broker.local_address().clone();
        let close = broker.close_handle();
        let task = tokio::spawn(broker.run());

        Self {
            address,
            close,
            task,
        }
    }

    async fn stop(self) -> Result<()> {
        self.close.close();
        self.task.await??;
        Ok(())
    }
}

/// Receive the next message which didn't originate from the bus itself.
async fn recv_from_peer(c: &Connection) -> Result<Message> {
    loop {
        let m = tokio::time::timeout(Duration::from_secs(10), c.recv())
            .await
            .context("timed out")??;

        if m.sender() != Some("org.freedesktop.DBus") {
            return Ok(m);
        }
    }
}

#[tokio::test]
async fn unix_external_call_is_routed() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let broker = BrokerBuilder::new(Address::unix_path(dir.path().join("bus")))
        .keyring_dir(dir.path().join("keyrings"))
        .bind()
        .await?;

    let running = Running::start(broker);

    let a = ConnectionBuilder::new()
        .address(running.address.clone())
        .mechanisms(AuthModes::EXTERNAL)
        .build()
        .await?;

    let b = ConnectionBuilder::new()
        .address(running.address.clone())
        .mechanisms(AuthModes::EXTERNAL)
        .build()
        .await?;

    assert_eq!(a.guid(), running.address.guid());

    let a_name = a.unique_name().context("a has no name")?.to_owned();
    let b_name = b.unique_name().context("b has no name")?.to_owned();
    assert_ne!(a_name, b_name);

    let mut body = BodyBuf::new();
    body.store("ping")?;

    let call = a
        .method_call(PATH, "Echo")
        .with_interface("se.tedro.Test")
        .with_destination(&b_name)
        .with_body(body);

    let serial = call.serial();

    let (reply, ()) = tokio::try_join!(async { Ok::<_, anyhow::Error>(a.call(call).await?) }, async {
        let m = recv_from_peer(&b).await?;

        assert_eq!(m.sender(), Some(a_name.as_str()));
        assert_eq!(m.destination(), Some(b_name.as_str()));
        assert_eq!(m.serial(), serial);
        assert_eq!(m.member(), Some("Echo"));
        assert_eq!(m.body().read::<str>()?, "ping");

        let mut body = BodyBuf::new();
        body.store("pong")?;
        b.send(m.method_return(b.next_serial()).with_body(body))?;
        Ok::<_, anyhow::Error>(())
    })?;

    assert_eq!(reply.reply_serial(), Some(serial));
    assert_eq!(reply.sender(), Some(b_name.as_str()));
    assert_eq!(reply.body().read::<str>()?, "pong");

    running.stop().await?;
    Ok(())
}

#[tokio::test]
async fn tcp_cookie_well_known_name() -> Result<()> {
    const NAME: &str = "se.tedro.Cookie";

    let dir = tempfile::tempdir()?;

    let broker = BrokerBuilder::new(Address::tcp("127.0.0.1", 0))
        .keyring_dir(dir.path())
        .bind()
        .await?;

    let running = Running::start(broker);

    let connect = || {
        let mut builder = ConnectionBuilder::new();
        builder.address(running.address.clone()).keyring_dir(dir.path());
        async move { builder.build().await }
    };

    let server = connect().await?;
    let client = connect().await?;

    assert_eq!(
        server.request_name(NAME, NameFlag::DO_NOT_QUEUE).await?,
        NameReply::PRIMARY_OWNER
    );

    assert_eq!(
        client.request_name(NAME, NameFlag::DO_NOT_QUEUE).await?,
        NameReply::EXISTS
    );

    let call = client.method_call(PATH, "Hello").with_destination(NAME);

    let (reply, ()) = tokio::try_join!(async { Ok::<_, anyhow::Error>(client.call(call).await?) }, async {
        let m = recv_from_peer(&server).await?;
        assert_eq!(m.sender(), client.unique_name());
        server.send(m.method_return(server.next_serial()))?;
        Ok::<_, anyhow::Error>(())
    })?;

    assert_eq!(reply.sender(), server.unique_name());

    // Once released the name can't be called any longer.
    server.release_name(NAME).await?;

    let call = client.method_call(PATH, "Hello").with_destination(NAME);
    let error = client.call(call).await.unwrap_err();
    let (name, _) = error.response_error().context("expected an error reply")?;
    assert_eq!(name, "org.freedesktop.DBus.Error.ServiceUnknown");

    running.stop().await?;
    Ok(())
}

#[tokio::test]
async fn failed_authentication_releases_address() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bus");

    let broker = BrokerBuilder::new(Address::unix_path(&path))
        .keyring_dir(dir.path().join("server-keyrings"))
        .bind()
        .await?;

    let running = Running::start(broker);

    // A cookie from another keyring is never accepted.
    let error = ConnectionBuilder::new()
        .address(running.address.clone())
        .mechanisms(AuthModes::COOKIE_SHA1)
        .keyring_dir(dir.path().join("client-keyrings"))
        .build()
        .await
        .err()
        .context("expected authentication to fail")?;

    assert!(error.is_authentication_failed(), "{error}");

    // The broker keeps serving other peers.
    let c = ConnectionBuilder::new()
        .address(running.address.clone())
        .build()
        .await?;

    assert!(c.unique_name().is_some());

    running.stop().await?;
    c.close_handle().closed().await;

    // The socket file is gone and the address can be bound again.
    assert!(!path.exists());

    let broker = BrokerBuilder::new(Address::unix_path(&path)).bind().await?;
    drop(broker);
    Ok(())
}

#[tokio::test]
async fn closing_broker_closes_peers() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let broker = BrokerBuilder::new(Address::unix_path(dir.path().join("bus")))
        .bind()
        .await?;

    let running = Running::start(broker);

    let c = ConnectionBuilder::new()
        .address(running.address.clone())
        .build()
        .await?;

    let pending = c.method_call(PATH, "Never").with_destination(c.unique_name().unwrap_or_default());

    let (result, stopped) = tokio::join!(c.call(pending), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        running.stop().await
    });

    stopped?;
    assert!(result.unwrap_err().is_connection_closed());
    Ok(())
}

#[tokio::test]
async fn signals_follow_match_rules() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let broker = BrokerBuilder::new(Address::unix_path(dir.path().join("bus")))
        .bind()
        .await?;

    let running = Running::start(broker);

    let connect = || {
        let mut builder = ConnectionBuilder::new();
        builder.address(running.address.clone());
        async move { builder.build().await }
    };

    let emitter = connect().await?;
    let listener = connect().await?;

    listener
        .add_match("type='signal',interface='se.tedro.Test',member='Changed'")
        .await?;

    emitter.send(Message::signal(PATH, "se.tedro.Test", "Ignored", emitter.next_serial()))?;
    emitter.send(Message::signal(PATH, "se.tedro.Test", "Changed", emitter.next_serial()))?;

    let m = recv_from_peer(&listener).await?;
    assert_eq!(m.member(), Some("Changed"));
    assert_eq!(m.sender(), emitter.unique_name());

    running.stop().await?;
    Ok(())
}
