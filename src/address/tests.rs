use std::path::Path;

use crate::error::Result;
use crate::sasl::Guid;

use super::{from_env, Address, AddressKind};

#[test]
fn unix_addresses() -> Result<()> {
    let address = Address::parse("unix:path=/var/run/dbus/system_bus_socket")?;
    assert_eq!(
        address.kind(),
        &AddressKind::UnixPath("/var/run/dbus/system_bus_socket".into())
    );
    assert!(!address.is_listen());
    assert!(address.is_unix());

    let address = Address::parse("unix:abstract=/tmp/dbus-XYZ,guid=0123456789abcdef0123456789abcdef")?;
    assert_eq!(address.kind(), &AddressKind::UnixAbstract(b"/tmp/dbus-XYZ"[..].into()));
    assert_eq!(address.guid(), Some("0123456789abcdef0123456789abcdef".parse::<Guid>()?));

    assert!(Address::parse("unix:path=/a,abstract=b").is_err());
    assert!(Address::parse("unix:listen=1").is_err());
    Ok(())
}

#[test]
fn tcp_addresses() -> Result<()> {
    let address = Address::parse("tcp:host=127.0.0.1,port=4242")?;
    assert_eq!(
        address.kind(),
        &AddressKind::Tcp {
            host: "127.0.0.1".into(),
            port: 4242
        }
    );
    assert!(!address.is_unix());

    // Listening without a port picks any port.
    let address = Address::parse("tcp:host=localhost,listen=1")?;
    assert!(address.is_listen());
    assert!(matches!(address.kind(), AddressKind::Tcp { port: 0, .. }));

    assert!(Address::parse("tcp:host=localhost").is_err());
    assert!(Address::parse("tcp:host=localhost,port=99999").is_err());
    Ok(())
}

#[test]
fn escapes() -> Result<()> {
    let address = Address::parse("unix:path=/tmp/with%2cco%6dma")?;
    assert_eq!(address.kind(), &AddressKind::UnixPath("/tmp/with,comma".into()));
    assert_eq!(address.to_string(), "unix:path=/tmp/with%2ccomma");

    assert!(Address::parse("unix:path=/tmp/%zz").is_err());
    assert!(Address::parse("unix:path=/tmp/%2").is_err());
    Ok(())
}

#[test]
fn lists() -> Result<()> {
    let list = Address::parse_list("foo:bar=baz;unix:path=/a;;tcp:host=h,port=1")?;
    assert_eq!(list.len(), 2);
    assert_eq!(list[0], Address::unix_path("/a"));
    assert_eq!(list[1], Address::tcp("h", 1));

    assert!(Address::parse("foo:bar=baz").is_err());
    assert!(Address::parse_list("nocolon").is_err());
    assert!(Address::parse_list("unix:path").is_err());
    Ok(())
}

#[test]
fn display_round_trip() -> Result<()> {
    let guid = Guid::generate();

    let addresses = [
        Address::unix_path(Path::new("/run/user/1000/bus")),
        Address::unix_abstract("hidden space").with_listen(true),
        Address::tcp("localhost", 0).with_listen(true).with_guid(guid),
    ];

    for address in addresses {
        let string = address.to_string();
        assert_eq!(string.parse::<Address>()?, address, "{string}");
    }

    Ok(())
}

#[test]
fn environment() -> Result<()> {
    let env = |vars: &'static [(&'static str, &'static str)]| {
        move |name: &str| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    };

    let names = ["DBUS_STARTER_ADDRESS", "DBUS_SESSION_BUS_ADDRESS"];

    let address = from_env(
        &names,
        None,
        env(&[("DBUS_SESSION_BUS_ADDRESS", "unix:path=/session")]),
    )?;
    assert_eq!(address, Address::unix_path("/session"));

    let address = from_env(
        &names,
        None,
        env(&[
            ("DBUS_SESSION_BUS_ADDRESS", "unix:path=/session"),
            ("DBUS_STARTER_ADDRESS", "unix:path=/starter"),
        ]),
    )?;
    assert_eq!(address, Address::unix_path("/starter"));

    assert!(from_env(&names, None, env(&[])).is_err());

    let address = from_env(&names, Some("unix:path=/system"), env(&[]))?;
    assert_eq!(address, Address::unix_path("/system"));
    Ok(())
}
