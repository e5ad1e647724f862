use std::num::NonZeroU32;

use crate::error::Result;
use crate::proto::{Endianness, MessageType};
use crate::{BodyBuf, Message, MessageKind, ObjectPath, SerialCounter};

#[test]
fn serial_counter_skips_zero() {
    let serials = SerialCounter::starting_at(u32::MAX);
    assert_eq!(serials.next().get(), u32::MAX);
    assert_eq!(serials.next().get(), 1);
    assert_eq!(serials.next().get(), 2);
}

#[test]
fn error_reply() -> Result<()> {
    let serials = SerialCounter::new();

    let call = Message::method_call(ObjectPath::new("/se/tedro/Example")?, "Frob", serials.next())
        .with_sender(":1.4")
        .with_destination(":1.9");

    let error = call.error("org.freedesktop.DBus.Error.UnknownMethod", serials.next());

    assert_eq!(error.message_type(), MessageType::ERROR);
    assert_eq!(
        error.error_name(),
        Some("org.freedesktop.DBus.Error.UnknownMethod")
    );
    assert_eq!(error.reply_serial(), Some(call.serial()));
    assert_eq!(error.destination(), Some(":1.4"));
    assert_eq!(error.sender(), Some(":1.9"));
    assert!(error.path().is_none());
    assert!(!error.is_reply_expected());
    Ok(())
}

#[test]
fn body_takes_endianness() -> Result<()> {
    let mut body = BodyBuf::with_endianness(Endianness::BIG);
    body.store(0x0102u16)?;

    let m = Message::signal(ObjectPath::ROOT, "se.tedro.Example", "Tick", NonZeroU32::MIN)
        .with_body(body);

    assert!(matches!(m.kind(), MessageKind::Signal { .. }));
    assert_eq!(m.endianness(), Endianness::BIG);
    assert_eq!(m.signature(), "q");
    assert_eq!(m.body().load::<u16>()?, 0x0102);
    Ok(())
}
