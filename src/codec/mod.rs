//! Encoding and decoding of whole messages.
//!
//! A message on the wire consists of a 12 byte fixed header, the length of the
//! header field array, the header fields themselves padded to 8 bytes and
//! finally the body.
//!
//! ```text
//! yyyyuu a(yv) <padding> <body>
//! ```


use std::num::NonZeroU32;

use crate::body::{demarshal, Depth};
use crate::buf::{AlignedBuf, ReadBuf, MAX_ARRAY_LENGTH, MAX_BODY_LENGTH, MAX_MESSAGE_LENGTH};
use crate::error::{Error, ErrorKind, Result};
use crate::proto::{
    Endianness, Flags, HeaderField, MessageType, FIXED_HEADER_LENGTH, PREAMBLE_LENGTH,
    PROTOCOL_VERSION,
};
use crate::utils::align_up;
use crate::{Body, Frame, Message, MessageKind, ObjectPath, OwnedSignature, Signature};

const HEADER_FIELD: &Signature = Signature::new_const(b"(yv)");

/// The fixed part of a message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FixedHeader {
    pub(crate) endianness: Endianness,
    pub(crate) message_type: MessageType,
    pub(crate) flags: Flags,
    pub(crate) body_length: u32,
    pub(crate) serial: u32,
}

impl FixedHeader {
    /// Parse the fixed header out of the first 12 bytes of a message.
    ///
    /// The protocol version is checked before anything else, and errors
    /// raised here are fatal to the stream.
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        let version = bytes.get(3).copied().unwrap_or(PROTOCOL_VERSION);

        if version != PROTOCOL_VERSION {
            return Err(Error::new(ErrorKind::UnsupportedProtocolVersion(version)));
        }

        let [endianness, message_type, flags, _] = match bytes.get(..4) {
            Some(&[a, b, c, d]) => [a, b, c, d],
            _ => return Err(Error::new(ErrorKind::BufferUnderflow)),
        };

        let endianness = Endianness::new(endianness);

        if !endianness.is_valid() {
            return Err(Error::new(ErrorKind::InvalidEndianness(endianness.get())));
        }

        let mut buf = ReadBuf::new(bytes.get(..FIXED_HEADER_LENGTH).unwrap_or(&[]), endianness);
        buf.advance(4)?;
        let body_length = buf.load::<u32>()?;
        let serial = buf.load::<u32>()?;

        if body_length > MAX_BODY_LENGTH {
            return Err(Error::new(ErrorKind::BodyTooLong(body_length)));
        }

        Ok(Self {
            endianness,
            message_type: MessageType::new(message_type),
            flags: Flags::new(flags),
            body_length,
            serial,
        })
    }

    /// Read and check the length of the header field array from the 4 bytes
    /// following the fixed header.
    pub(crate) fn header_length(&self, bytes: &[u8]) -> Result<u32> {
        let Some(bytes) = bytes.get(..4) else {
            return Err(Error::new(ErrorKind::BufferUnderflow));
        };

        let length = u32::read_from(bytes, self.endianness);

        if length > MAX_ARRAY_LENGTH {
            return Err(Error::new(ErrorKind::HeaderLengthTooLong(length)));
        }

        let total = PREAMBLE_LENGTH + align_up(length as usize, 8) + self.body_length as usize;

        if total > MAX_MESSAGE_LENGTH {
            return Err(Error::new(ErrorKind::MessageTooLong(total)));
        }

        Ok(length)
    }
}

/// Encode a message into its wire representation.
///
/// The message is encoded in its own endianness.
///
/// # Errors
///
/// Errors if a header value can't be represented, like a member containing a
/// nul byte, or if the message is too large.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::{codec, Message, ObjectPath, SerialCounter};
///
/// let serials = SerialCounter::new();
///
/// let m = Message::method_call(ObjectPath::ROOT, "Hello", serials.next())
///     .with_destination("org.freedesktop.DBus");
///
/// let bytes = codec::encode(&m)?;
/// assert_eq!(bytes.len() % 8, 0);
///
/// let (preamble, rest) = bytes.split_at(16);
/// let (header, body) = rest.split_at(rest.len());
///
/// assert_eq!(codec::decode(preamble, header, body)?, m);
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let body_length = match u32::try_from(message.body.len()) {
        Ok(length) if length <= MAX_BODY_LENGTH => length,
        _ => return Err(Error::new(ErrorKind::MessageTooLong(message.body.len()))),
    };

    let mut buf = AlignedBuf::with_endianness(message.endianness);

    buf.store(message.endianness.get());
    buf.store(message.message_type().get());
    buf.store(message.flags.get());
    buf.store(PROTOCOL_VERSION);
    buf.store(body_length);
    buf.store(message.serial.get());

    let mut array = buf.write_array(HEADER_FIELD);

    match &message.kind {
        MessageKind::MethodCall { path, member } => {
            write_path(&mut array, path);
            write_str(&mut array, HeaderField::MEMBER, "MEMBER", member)?;
        }
        MessageKind::MethodReturn { reply_serial } => {
            write_u32(&mut array, HeaderField::REPLY_SERIAL, reply_serial.get());
        }
        MessageKind::Error {
            error_name,
            reply_serial,
        } => {
            write_str(&mut array, HeaderField::ERROR_NAME, "ERROR_NAME", error_name)?;
            write_u32(&mut array, HeaderField::REPLY_SERIAL, reply_serial.get());
        }
        MessageKind::Signal { path, member } => {
            write_path(&mut array, path);
            write_str(&mut array, HeaderField::MEMBER, "MEMBER", member)?;
        }
    }

    if let Some(interface) = &message.interface {
        write_str(&mut array, HeaderField::INTERFACE, "INTERFACE", interface)?;
    }

    if let Some(destination) = &message.destination {
        write_str(&mut array, HeaderField::DESTINATION, "DESTINATION", destination)?;
    }

    if let Some(sender) = &message.sender {
        write_str(&mut array, HeaderField::SENDER, "SENDER", sender)?;
    }

    if !message.signature.is_empty() {
        let st = array.write_struct();
        st.store(HeaderField::SIGNATURE);
        st.write(Signature::SIGNATURE);
        st.write::<Signature>(&message.signature);
    }

    if let Some(unix_fds) = message.unix_fds {
        write_u32(&mut array, HeaderField::UNIX_FDS, unix_fds);
    }

    array.finish()?;
    buf.align_mut(8);
    buf.extend_from_slice(&message.body);

    if buf.len() > MAX_MESSAGE_LENGTH {
        return Err(Error::new(ErrorKind::MessageTooLong(buf.len())));
    }

    Ok(buf.into_vec())
}

fn write_path(buf: &mut AlignedBuf, path: &ObjectPath) {
    let st = buf.write_struct();
    st.store(HeaderField::PATH);
    st.write(Signature::OBJECT_PATH);
    st.write(path);
}

fn write_str(
    buf: &mut AlignedBuf,
    field: HeaderField,
    name: &'static str,
    value: &str,
) -> Result<()> {
    if value.as_bytes().contains(&0) {
        return Err(Error::new(ErrorKind::InvalidHeaderValue(name)));
    }

    let st = buf.write_struct();
    st.store(field);
    st.write(Signature::STRING);
    st.write(value);
    Ok(())
}

fn write_u32(buf: &mut AlignedBuf, field: HeaderField, value: u32) {
    let st = buf.write_struct();
    st.store(field);
    st.write(Signature::UINT32);
    st.store(value);
}

/// Decode a message from its three parts.
///
/// * `preamble` is the 12 byte fixed header followed by the 4 byte length of
///   the header field array.
/// * `header` is the header field array including the padding which brings
///   it up to a multiple of 8 bytes.
/// * `body` is the body of the message.
///
/// The protocol version is checked before anything else is looked at.
///
/// # Errors
///
/// Errors if the lengths of the parts don't match what the preamble declares,
/// if any mandatory header field is missing or if the body doesn't match its
/// signature. See [`Error::is_unsupported_protocol_version`] and
/// [`Error::is_malformed`].
pub fn decode(preamble: &[u8], header: &[u8], body: &[u8]) -> Result<Message> {
    let fixed = FixedHeader::parse(preamble)?;

    if preamble.len() != PREAMBLE_LENGTH {
        return Err(Error::new(ErrorKind::LengthMismatch));
    }

    let header_length = fixed.header_length(&preamble[FIXED_HEADER_LENGTH..])? as usize;

    if header.len() != align_up(header_length, 8) || body.len() != fixed.body_length as usize {
        return Err(Error::new(ErrorKind::LengthMismatch));
    }

    decode_parts(fixed, &header[..header_length], body)
}

/// Decode a message once the fixed header has been checked and the parts
/// have been sized.
pub(crate) fn decode_parts(fixed: FixedHeader, header: &[u8], body: &[u8]) -> Result<Message> {
    if !matches!(
        fixed.message_type,
        MessageType::METHOD_CALL
            | MessageType::METHOD_RETURN
            | MessageType::ERROR
            | MessageType::SIGNAL
    ) {
        return Err(Error::new(ErrorKind::InvalidMessageType(
            fixed.message_type.get(),
        )));
    }

    let serial = NonZeroU32::new(fixed.serial).ok_or(ErrorKind::ZeroSerial)?;

    let mut path = None;
    let mut interface = None;
    let mut member = None;
    let mut error_name = None;
    let mut reply_serial = None;
    let mut destination = None;
    let mut sender = None;
    let mut signature = Signature::EMPTY;
    let mut unix_fds = None;

    let mut fields = ReadBuf::new(header, fixed.endianness);

    while !fields.is_empty() {
        // NB: Each field is a struct, so they're aligned to 8 bytes.
        fields.align(8)?;

        let field = fields.load::<HeaderField>()?;
        let sig = fields.read::<Signature>()?;

        match (field, sig.as_bytes()) {
            (HeaderField::PATH, b"o") => {
                path = Some(fields.read::<ObjectPath>()?);
            }
            (HeaderField::INTERFACE, b"s") => {
                interface = Some(fields.read::<str>()?);
            }
            (HeaderField::MEMBER, b"s") => {
                member = Some(fields.read::<str>()?);
            }
            (HeaderField::ERROR_NAME, b"s") => {
                error_name = Some(fields.read::<str>()?);
            }
            (HeaderField::REPLY_SERIAL, b"u") => {
                let number = fields.load::<u32>()?;
                let number = NonZeroU32::new(number).ok_or(ErrorKind::ZeroReplySerial)?;
                reply_serial = Some(number);
            }
            (HeaderField::DESTINATION, b"s") => {
                destination = Some(fields.read::<str>()?);
            }
            (HeaderField::SENDER, b"s") => {
                sender = Some(fields.read::<str>()?);
            }
            (HeaderField::SIGNATURE, b"g") => {
                signature = fields.read::<Signature>()?;
            }
            (HeaderField::UNIX_FDS, b"u") => {
                unix_fds = Some(fields.load::<u32>()?);
            }
            (field, _) if field.get() <= 9 => {
                return Err(Error::new(ErrorKind::InvalidHeaderField(field.get())));
            }
            (_, _) => {
                if !sig.is_single_complete_type() {
                    return Err(Error::new(ErrorKind::InvalidVariantSignature));
                }

                // Header fields are already inside of `a(yv)`.
                let depth = Depth::default().array()?.structure()?.variant()?;
                demarshal(&mut fields, sig, depth)?;
            }
        }
    }

    let kind = match fixed.message_type {
        MessageType::METHOD_CALL => {
            let Some(path) = path else {
                return Err(Error::new(ErrorKind::MissingPath));
            };

            let Some(member) = member else {
                return Err(Error::new(ErrorKind::MissingMember));
            };

            MessageKind::MethodCall {
                path: path.to_owned(),
                member: member.into(),
            }
        }
        MessageType::METHOD_RETURN => {
            let Some(reply_serial) = reply_serial else {
                return Err(Error::new(ErrorKind::MissingReplySerial));
            };

            MessageKind::MethodReturn { reply_serial }
        }
        MessageType::ERROR => {
            let Some(error_name) = error_name else {
                return Err(Error::new(ErrorKind::MissingErrorName));
            };

            let Some(reply_serial) = reply_serial else {
                return Err(Error::new(ErrorKind::MissingReplySerial));
            };

            MessageKind::Error {
                error_name: error_name.into(),
                reply_serial,
            }
        }
        _ => {
            let Some(path) = path else {
                return Err(Error::new(ErrorKind::MissingPath));
            };

            let Some(member) = member else {
                return Err(Error::new(ErrorKind::MissingMember));
            };

            if interface.is_none() {
                return Err(Error::new(ErrorKind::MissingInterface));
            }

            MessageKind::Signal {
                path: path.to_owned(),
                member: member.into(),
            }
        }
    };

    Body::new(body, fixed.endianness, signature).values()?;

    Ok(Message {
        kind,
        serial,
        flags: fixed.flags,
        interface: interface.map(Box::from),
        destination: destination.map(Box::from),
        sender: sender.map(Box::from),
        unix_fds,
        signature: OwnedSignature::from(signature),
        body: body.into(),
        endianness: fixed.endianness,
    })
}
