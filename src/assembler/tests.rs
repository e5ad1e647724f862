use crate::codec::encode;
use crate::error::{ErrorKind, Result};
use crate::proto::Endianness;
use crate::{BodyBuf, Message, ObjectPath, SerialCounter, Value};

use super::{FrameAssembler, Stage};

fn messages() -> Result<Vec<Message>> {
    let serials = SerialCounter::new();

    let mut body = BodyBuf::with_endianness(Endianness::BIG);
    body.store("hello")?;
    body.store_value(&Value::Struct(vec![Value::Byte(1), Value::UInt64(2)]))?;

    let call = Message::method_call(ObjectPath::new("/se/tedro/Example")?, "Frob", serials.next())
        .with_destination(":1.2")
        .with_body(body);

    let mut body = BodyBuf::with_endianness(Endianness::LITTLE);
    body.store(42u32)?;

    let reply = call.method_return(serials.next()).with_body(body);

    let signal = Message::signal(ObjectPath::ROOT, "se.tedro.Example", "Tick", serials.next());

    Ok(vec![call, reply, signal])
}

fn encoded(messages: &[Message]) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();

    for message in messages {
        bytes.extend(encode(message)?);
    }

    Ok(bytes)
}

#[test]
fn chunking_invariance() -> Result<()> {
    let messages = messages()?;
    let bytes = encoded(&messages)?;

    for chunk in 1..=bytes.len() {
        let mut assembler = FrameAssembler::new();
        let mut out = Vec::new();

        for bytes in bytes.chunks(chunk) {
            for message in assembler.feed(bytes) {
                out.push(message?);
            }
        }

        assert_eq!(out, messages, "chunk size {chunk}");
        assert_eq!(assembler.buffered(), 0);
        assert_eq!(assembler.stage(), Stage::Preamble);
    }

    Ok(())
}

#[test]
fn multiple_frames_in_one_chunk() -> Result<()> {
    let messages = messages()?;
    let bytes = encoded(&messages[..2])?;

    let mut assembler = FrameAssembler::new();
    let out = assembler.feed(&bytes).collect::<Result<Vec<_>>>()?;
    assert_eq!(out, &messages[..2]);
    Ok(())
}

#[test]
fn retains_entire_prefix() -> Result<()> {
    let messages = messages()?;
    let bytes = encode(&messages[0])?;

    let mut assembler = FrameAssembler::new();

    assert_eq!(assembler.feed(&bytes[..5]).count(), 0);
    assert_eq!(assembler.stage(), Stage::Preamble);

    assert_eq!(assembler.feed(&bytes[5..14]).count(), 0);
    assert_eq!(assembler.stage(), Stage::HeaderLength);

    assert_eq!(assembler.feed(&bytes[14..20]).count(), 0);
    assert_eq!(assembler.stage(), Stage::Header);

    assert_eq!(assembler.feed(&bytes[20..bytes.len() - 1]).count(), 0);
    assert_eq!(assembler.stage(), Stage::Body);
    assert_eq!(assembler.buffered(), bytes.len() - 1);

    let out = assembler
        .feed(&bytes[bytes.len() - 1..])
        .collect::<Result<Vec<_>>>()?;

    assert_eq!(out, &messages[..1]);
    assert_eq!(assembler.buffered(), 0);
    Ok(())
}

#[test]
fn unread_frames_are_kept() -> Result<()> {
    let messages = messages()?;
    let bytes = encoded(&messages)?;

    let mut assembler = FrameAssembler::new();

    // Only take the first message, the rest stays buffered.
    let first = assembler.feed(&bytes).next().transpose()?;
    assert_eq!(first.as_ref(), Some(&messages[0]));

    let rest = assembler.feed(&[]).collect::<Result<Vec<_>>>()?;
    assert_eq!(rest, &messages[1..]);
    Ok(())
}

#[test]
fn unsupported_version_poisons() -> Result<()> {
    let messages = messages()?;
    let mut bytes = encode(&messages[2])?;
    bytes[3] = 2;

    let mut assembler = FrameAssembler::new();

    // Nothing is produced before the fixed header is complete.
    assert_eq!(assembler.feed(&bytes[..11]).count(), 0);

    let mut frames = assembler.feed(&bytes[11..12]);
    let error = frames.next().and_then(|e| e.err());
    assert!(error.is_some_and(|e| e.is_unsupported_protocol_version()));
    assert!(frames.next().is_none());

    assert!(assembler.is_poisoned());
    assert_eq!(assembler.buffered(), 0);

    let valid = encode(&messages[0])?;
    let mut frames = assembler.feed(&valid);

    let error = frames.next().and_then(|e| e.err());
    assert!(error.is_some_and(|e| matches!(e.kind(), ErrorKind::AssemblerPoisoned) && e.is_fatal()));
    assert!(frames.next().is_none());
    Ok(())
}

#[test]
fn body_too_long_poisons() {
    #[rustfmt::skip]
    let preamble = [
        b'l', 1, 0, 1,
        0xff, 0xff, 0xff, 0xff,
        1, 0, 0, 0,
    ];

    let mut assembler = FrameAssembler::new();
    let error = assembler.feed(&preamble).next().and_then(|e| e.err());
    assert!(error.is_some_and(|e| matches!(e.kind(), ErrorKind::BodyTooLong(u32::MAX))));
    assert!(assembler.is_poisoned());
}

#[test]
fn malformed_message_is_not_fatal() -> Result<()> {
    let messages = messages()?;

    let mut bad = encode(&messages[2])?;
    bad[8..12].fill(0);

    let mut bytes = bad;
    bytes.extend(encode(&messages[0])?);

    let mut assembler = FrameAssembler::new();
    let mut frames = assembler.feed(&bytes);

    let error = frames.next().and_then(|e| e.err());
    assert!(error.is_some_and(|e| matches!(e.kind(), ErrorKind::ZeroSerial) && !e.is_fatal()));

    let next = frames.next().transpose()?;
    assert_eq!(next.as_ref(), Some(&messages[0]));
    assert!(frames.next().is_none());

    assert!(!assembler.is_poisoned());
    Ok(())
}
