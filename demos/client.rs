use anyhow::Result;
use tokio_dbus_wire::{BodyBuf, Connection, ObjectPath};
use tracing_subscriber::EnvFilter;

const NAME: &str = "se.tedro.DBusExample";
const INTERFACE: &str = "se.tedro.DBusExample.Pingable";
const PATH: &ObjectPath = ObjectPath::new_const(b"/se/tedro/DBusExample");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let c = Connection::session_bus().await?;

    let mut body = BodyBuf::new();
    body.store(41u32)?;

    let m = c
        .method_call(PATH, "Ping")
        .with_destination(NAME)
        .with_interface(INTERFACE)
        .with_body(body);

    let reply = c.call(m).await?;
    println!("{:?}", reply.body().load::<u32>()?);
    Ok(())
}
