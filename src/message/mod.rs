//! The message type and its parts.

#[cfg(test)]
mod tests;

pub use self::message::Message;
#[allow(clippy::module_inception)]
mod message;

pub use self::message_kind::MessageKind;
mod message_kind;

pub use self::serial::SerialCounter;
mod serial;
