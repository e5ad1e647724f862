use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;

use crate::buf::{MAX_ARRAY_LENGTH, MAX_BODY_LENGTH, MAX_MESSAGE_LENGTH};
use crate::ObjectPathError;
use crate::SignatureError;

/// Result alias using an [`Error`] as the error type by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error raised by this crate.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Self { kind }
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Construct an authentication failure with a reason.
    #[inline]
    pub(crate) fn authentication_failed(reason: impl Into<Box<str>>) -> Error {
        Self::new(ErrorKind::AuthenticationFailed(reason.into()))
    }

    /// Test if the error indicates that the operation would block.
    #[inline]
    pub(crate) fn would_block(&self) -> bool {
        matches!(self.kind, ErrorKind::WouldBlock)
    }

    /// Test if the peer declared a protocol version we don't speak.
    ///
    /// The connection must be closed immediately without buffering any more
    /// bytes from the peer.
    #[inline]
    pub fn is_unsupported_protocol_version(&self) -> bool {
        matches!(self.kind, ErrorKind::UnsupportedProtocolVersion(..))
    }

    /// Test if the error is caused by a malformed header or body.
    ///
    /// Such an error is scoped to a single message.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Signature(..)
                | ErrorKind::ObjectPath(..)
                | ErrorKind::Utf8Error(..)
                | ErrorKind::BufferUnderflow
                | ErrorKind::InvalidMessageType(..)
                | ErrorKind::MissingPath
                | ErrorKind::MissingMember
                | ErrorKind::MissingInterface
                | ErrorKind::MissingReplySerial
                | ErrorKind::MissingErrorName
                | ErrorKind::ZeroSerial
                | ErrorKind::ZeroReplySerial
                | ErrorKind::InvalidHeaderField(..)
                | ErrorKind::NotNullTerminated
                | ErrorKind::InteriorNul
                | ErrorKind::InvalidBoolean(..)
                | ErrorKind::InvalidVariantSignature
                | ErrorKind::ArrayTooLong(..)
                | ErrorKind::LengthMismatch
                | ErrorKind::TrailingBody(..)
                | ErrorKind::ExceededVariantDepth
                | ErrorKind::ExceededNestingDepth
        )
    }

    /// Test if the error was raised while encoding a message, such as a
    /// header value which can't be represented on the wire.
    pub fn is_encoding(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidHeaderValue(..)
                | ErrorKind::ArrayElementMismatch
                | ErrorKind::MessageTooLong(..)
        )
    }

    /// Test if the error is an authentication failure.
    #[inline]
    pub fn is_authentication_failed(&self) -> bool {
        matches!(self.kind, ErrorKind::AuthenticationFailed(..))
    }

    /// Test if the connection the operation was performed on is closed.
    #[inline]
    pub fn is_connection_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::ConnectionClosed)
    }

    /// Test if the operation timed out.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Test if the error invalidates the stream of frames it was read from.
    ///
    /// After a fatal error the frame boundaries of the stream are unknown,
    /// so the connection has to be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UnsupportedProtocolVersion(..)
                | ErrorKind::InvalidEndianness(..)
                | ErrorKind::BodyTooLong(..)
                | ErrorKind::HeaderLengthTooLong(..)
                | ErrorKind::MessageTooLong(..)
                | ErrorKind::AssemblerPoisoned
        )
    }

    /// Access the error name and message of a remote error reply.
    pub fn response_error(&self) -> Option<(&str, &str)> {
        match &self.kind {
            ErrorKind::ResponseError(name, message) => Some((name, message)),
            _ => None,
        }
    }
}

impl From<SignatureError> for Error {
    #[inline]
    fn from(error: SignatureError) -> Self {
        Self::new(ErrorKind::Signature(error))
    }
}

impl From<ObjectPathError> for Error {
    #[inline]
    fn from(error: ObjectPathError) -> Self {
        Self::new(ErrorKind::ObjectPath(error))
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock => Self::new(ErrorKind::WouldBlock),
            _ => Self::new(ErrorKind::Io(error)),
        }
    }
}

impl From<Utf8Error> for Error {
    #[inline]
    fn from(error: Utf8Error) -> Self {
        Self::new(ErrorKind::Utf8Error(error))
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::Io(error) => error.fmt(f),
            ErrorKind::Signature(error) => error.fmt(f),
            ErrorKind::ObjectPath(error) => error.fmt(f),
            ErrorKind::Utf8Error(error) => error.fmt(f),
            ErrorKind::WouldBlock => write!(f, "Would block"),
            ErrorKind::BufferUnderflow => write!(f, "Buffer underflow"),
            ErrorKind::MissingBus => write!(f, "Missing bus address"),
            ErrorKind::InvalidAddress => write!(f, "Invalid d-bus address"),
            ErrorKind::UnsupportedAddress => write!(f, "Unsupported d-bus address"),
            ErrorKind::InvalidSasl => write!(f, "Invalid SASL message"),
            ErrorKind::InvalidSaslResponse => write!(f, "Invalid SASL command"),
            ErrorKind::InvalidGuid => write!(f, "Invalid server GUID"),
            ErrorKind::AuthenticationFailed(reason) => {
                write!(f, "Authentication failed: {reason}")
            }
            ErrorKind::UnsupportedAuthUid => {
                write!(f, "Uid authentication is not supported on this platform")
            }
            ErrorKind::UnsupportedProtocolVersion(version) => {
                write!(f, "Unsupported protocol version {version}")
            }
            ErrorKind::InvalidEndianness(byte) => write!(f, "Invalid endianness {byte:#04x}"),
            ErrorKind::InvalidMessageType(ty) => write!(f, "Invalid message type {ty}"),
            ErrorKind::MissingPath => write!(f, "Missing required PATH header"),
            ErrorKind::MissingMember => write!(f, "Missing required MEMBER header"),
            ErrorKind::MissingInterface => write!(f, "Missing required INTERFACE header"),
            ErrorKind::MissingReplySerial => write!(f, "Missing required REPLY_SERIAL header"),
            ErrorKind::MissingErrorName => write!(f, "Missing required ERROR_NAME header"),
            ErrorKind::ZeroSerial => write!(f, "Zero in header serial"),
            ErrorKind::ZeroReplySerial => write!(f, "Zero REPLY_SERIAL header"),
            ErrorKind::InvalidHeaderField(code) => {
                write!(f, "Header field {code} has an invalid signature")
            }
            ErrorKind::InvalidHeaderValue(field) => {
                write!(f, "Value of header field {field} can't be encoded")
            }
            ErrorKind::NotNullTerminated => write!(f, "String is not null terminated"),
            ErrorKind::InteriorNul => write!(f, "String contains an interior nul byte"),
            ErrorKind::InvalidBoolean(value) => write!(f, "Invalid boolean value {value}"),
            ErrorKind::InvalidVariantSignature => {
                write!(f, "Variant signature is not a single complete type")
            }
            ErrorKind::ArrayTooLong(length) => {
                write!(
                    f,
                    "Array of length {length} is too long (max is {MAX_ARRAY_LENGTH})"
                )
            }
            ErrorKind::BodyTooLong(length) => {
                write!(
                    f,
                    "Body of length {length} is too long (max is {MAX_BODY_LENGTH})"
                )
            }
            ErrorKind::HeaderLengthTooLong(length) => {
                write!(
                    f,
                    "Header fields of length {length} are too long (max is {MAX_ARRAY_LENGTH})"
                )
            }
            ErrorKind::MessageTooLong(length) => {
                write!(
                    f,
                    "Message of length {length} is too long (max is {MAX_MESSAGE_LENGTH})"
                )
            }
            ErrorKind::LengthMismatch => {
                write!(f, "Frame length does not match declared lengths")
            }
            ErrorKind::TrailingBody(n) => {
                write!(f, "Body has {n} trailing bytes not covered by its signature")
            }
            ErrorKind::ExceededVariantDepth => write!(f, "Exceeded maximum variant depth"),
            ErrorKind::ExceededNestingDepth => write!(f, "Exceeded maximum container nesting"),
            ErrorKind::ArrayElementMismatch => {
                write!(f, "Array element does not match the array element type")
            }
            ErrorKind::ConnectionClosed => write!(f, "Connection closed"),
            ErrorKind::ResponseError(error_name, message) => {
                write!(f, "Response error: {error_name}: {message}")
            }
            ErrorKind::Timeout => write!(f, "Operation timed out"),
            ErrorKind::AssemblerPoisoned => {
                write!(f, "Frame assembler is poisoned by an earlier error")
            }
            ErrorKind::InvalidMatchRule(rule) => write!(f, "Invalid match rule: {rule}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(error) => Some(error),
            ErrorKind::Signature(error) => Some(error),
            ErrorKind::ObjectPath(error) => Some(error),
            ErrorKind::Utf8Error(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum ErrorKind {
    Io(io::Error),
    Signature(SignatureError),
    ObjectPath(ObjectPathError),
    Utf8Error(Utf8Error),
    WouldBlock,
    BufferUnderflow,
    MissingBus,
    InvalidAddress,
    UnsupportedAddress,
    InvalidSasl,
    InvalidSaslResponse,
    InvalidGuid,
    AuthenticationFailed(Box<str>),
    #[cfg_attr(all(unix, feature = "libc"), allow(unused))]
    UnsupportedAuthUid,
    UnsupportedProtocolVersion(u8),
    InvalidEndianness(u8),
    InvalidMessageType(u8),
    MissingPath,
    MissingMember,
    MissingInterface,
    MissingReplySerial,
    MissingErrorName,
    ZeroSerial,
    ZeroReplySerial,
    InvalidHeaderField(u8),
    InvalidHeaderValue(&'static str),
    NotNullTerminated,
    InteriorNul,
    InvalidBoolean(u32),
    InvalidVariantSignature,
    BodyTooLong(u32),
    ArrayTooLong(u32),
    HeaderLengthTooLong(u32),
    MessageTooLong(usize),
    LengthMismatch,
    TrailingBody(usize),
    ExceededVariantDepth,
    ExceededNestingDepth,
    ArrayElementMismatch,
    ConnectionClosed,
    ResponseError(Box<str>, Box<str>),
    Timeout,
    AssemblerPoisoned,
    InvalidMatchRule(Box<str>),
}
