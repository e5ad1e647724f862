use std::num::NonZeroU32;

use crate::proto::MessageType;
use crate::OwnedObjectPath;

/// The kind of a D-Bus message, carrying the header fields which are
/// mandatory for that kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Method call. This message type may prompt a reply.
    MethodCall {
        /// The path being called.
        path: OwnedObjectPath,
        /// The member being called.
        member: Box<str>,
    },
    /// Method reply with returned data.
    MethodReturn {
        /// The serial this is a reply to.
        reply_serial: NonZeroU32,
    },
    /// Error reply. If the first argument exists and is a string, it is an
    /// error message.
    Error {
        /// The name of the error.
        error_name: Box<str>,
        /// The serial this is a reply to.
        reply_serial: NonZeroU32,
    },
    /// Signal emission.
    Signal {
        /// The path of the object emitting the signal.
        path: OwnedObjectPath,
        /// The member being signalled.
        member: Box<str>,
    },
}

impl MessageKind {
    /// The message type as it appears on the wire.
    #[inline]
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageKind::MethodCall { .. } => MessageType::METHOD_CALL,
            MessageKind::MethodReturn { .. } => MessageType::METHOD_RETURN,
            MessageKind::Error { .. } => MessageType::ERROR,
            MessageKind::Signal { .. } => MessageType::SIGNAL,
        }
    }
}
