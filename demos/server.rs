use anyhow::{bail, Context, Result};
use tokio_dbus_wire::org_freedesktop_dbus::{NameFlag, NameReply};
use tokio_dbus_wire::{BodyBuf, Connection, Message, MessageType, ObjectPath};
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

    let reply = c.request_name(NAME, NameFlag::DO_NOT_QUEUE).await?;

    match reply {
        NameReply::PRIMARY_OWNER => {}
        reply => {
            bail!("Could not acquire name: {reply:?}");
        }
    }

    loop {
        let message = c.recv().await?;

        let (MessageType::METHOD_CALL, Some(path), Some(member)) =
            (message.message_type(), message.path(), message.member())
        else {
            continue;
        };

        let reply = match handle_method_call(path, member, &message) {
            Ok(body) => message.method_return(c.next_serial()).with_body(body),
            Err(error) => {
                let mut body = BodyBuf::new();
                body.store(error.to_string().as_str())?;

                message
                    .error("se.tedro.DBusExample.Error", c.next_serial())
                    .with_body(body)
            }
        };

        if message.is_reply_expected() {
            c.send(reply)?;
        }
    }
}

/// Handle a method call.
fn handle_method_call(path: &ObjectPath, member: &str, message: &Message) -> Result<BodyBuf> {
    let interface = message.interface().context("Missing interface")?;

    if path != PATH {
        bail!("Bad path: {path}");
    }

    if interface != INTERFACE {
        bail!("Bad interface: {interface}");
    }

    let mut body = BodyBuf::new();

    match member {
        "Ping" => {
            let value = message.body().load::<u32>()?;
            body.store(value.wrapping_add(1))?;
        }
        member => {
            bail!("Unsupported method: {member}");
        }
    }

    Ok(body)
}
