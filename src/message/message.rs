use std::num::NonZeroU32;

use crate::proto::{Endianness, Flags, MessageType};
use crate::{Body, BodyBuf, ObjectPath, OwnedSignature, Signature};

use super::MessageKind;

/// A D-Bus message.
///
/// Messages are immutable values, modified through the builder-style `with_*`
/// methods which consume and return the message.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroU32;
///
/// use tokio_dbus_wire::{BodyBuf, Message, MessageKind, ObjectPath};
///
/// const PATH: &ObjectPath = ObjectPath::new_const(b"/org/freedesktop/DBus");
///
/// let mut body = BodyBuf::new();
/// body.store("se.tedro.DBusExample")?;
/// body.store(0u32)?;
///
/// let serial = NonZeroU32::new(1).unwrap();
///
/// let m = Message::method_call(PATH, "RequestName", serial)
///     .with_interface("org.freedesktop.DBus")
///     .with_destination("org.freedesktop.DBus")
///     .with_body(body);
///
/// assert!(matches!(m.kind(), MessageKind::MethodCall { .. }));
/// assert_eq!(m.signature(), "su");
///
/// let mut body = m.body();
/// assert_eq!(body.read::<str>()?, "se.tedro.DBusExample");
/// assert_eq!(body.load::<u32>()?, 0);
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The type of the message.
    pub(crate) kind: MessageKind,
    /// Serial of the message.
    pub(crate) serial: NonZeroU32,
    /// Flags in the message.
    pub(crate) flags: Flags,
    /// The interface of the message.
    pub(crate) interface: Option<Box<str>>,
    /// The destination of the message.
    pub(crate) destination: Option<Box<str>>,
    /// The sender of the message.
    pub(crate) sender: Option<Box<str>>,
    /// The number of unix file descriptors accompanying the message.
    pub(crate) unix_fds: Option<u32>,
    /// The signature of the body.
    pub(crate) signature: OwnedSignature,
    /// The body associated with the message.
    pub(crate) body: Box<[u8]>,
    /// The endianness of the message.
    pub(crate) endianness: Endianness,
}

impl Message {
    fn new(kind: MessageKind, serial: NonZeroU32) -> Self {
        Self {
            kind,
            serial,
            flags: Flags::EMPTY,
            interface: None,
            destination: None,
            sender: None,
            unix_fds: None,
            signature: OwnedSignature::new(),
            body: Box::from([]),
            endianness: Endianness::NATIVE,
        }
    }

    /// Construct a method call.
    pub fn method_call(path: &ObjectPath, member: &str, serial: NonZeroU32) -> Self {
        Self::new(
            MessageKind::MethodCall {
                path: path.to_owned(),
                member: member.into(),
            },
            serial,
        )
    }

    /// Construct a signal.
    ///
    /// Signals must carry an interface.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroU32;
    ///
    /// use tokio_dbus_wire::{Message, ObjectPath};
    ///
    /// let path = ObjectPath::new("/se/tedro/Example")?;
    /// let m = Message::signal(path, "se.tedro.Example", "Ping", NonZeroU32::MIN);
    ///
    /// assert_eq!(m.interface(), Some("se.tedro.Example"));
    /// assert_eq!(m.member(), Some("Ping"));
    /// # Ok::<_, tokio_dbus_wire::Error>(())
    /// ```
    pub fn signal(path: &ObjectPath, interface: &str, member: &str, serial: NonZeroU32) -> Self {
        Self::new(
            MessageKind::Signal {
                path: path.to_owned(),
                member: member.into(),
            },
            serial,
        )
        .with_interface(interface)
    }

    /// Construct a [`MessageKind::MethodReturn`] message with an empty body
    /// which replies to this message.
    ///
    /// The destination of the reply is the sender of this message.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroU32;
    ///
    /// use tokio_dbus_wire::{Message, MessageKind, ObjectPath, SerialCounter};
    ///
    /// let serials = SerialCounter::new();
    ///
    /// let m = Message::method_call(ObjectPath::ROOT, "Hello", serials.next())
    ///     .with_sender(":1.7")
    ///     .with_destination("org.freedesktop.DBus");
    ///
    /// let m2 = m.method_return(serials.next());
    /// assert!(matches!(m2.kind(), MessageKind::MethodReturn { .. }));
    /// assert_eq!(m2.reply_serial(), Some(m.serial()));
    ///
    /// assert_eq!(m.sender(), m2.destination());
    /// assert_eq!(m.destination(), m2.sender());
    /// ```
    pub fn method_return(&self, serial: NonZeroU32) -> Self {
        self.reply(
            MessageKind::MethodReturn {
                reply_serial: self.serial,
            },
            serial,
        )
    }

    /// Construct a [`MessageKind::Error`] message with an empty body which
    /// replies to this message.
    pub fn error(&self, error_name: &str, serial: NonZeroU32) -> Self {
        self.reply(
            MessageKind::Error {
                error_name: error_name.into(),
                reply_serial: self.serial,
            },
            serial,
        )
    }

    fn reply(&self, kind: MessageKind, serial: NonZeroU32) -> Self {
        Self {
            destination: self.sender.clone(),
            sender: self.destination.clone(),
            endianness: self.endianness,
            ..Self::new(kind, serial)
        }
    }

    /// Get the kind of the message.
    #[inline]
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// The message type as it appears on the wire.
    #[inline]
    pub fn message_type(&self) -> MessageType {
        self.kind.message_type()
    }

    /// The object path of a method call or signal.
    pub fn path(&self) -> Option<&ObjectPath> {
        match &self.kind {
            MessageKind::MethodCall { path, .. } | MessageKind::Signal { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The member of a method call or signal.
    pub fn member(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::MethodCall { member, .. } | MessageKind::Signal { member, .. } => {
                Some(member)
            }
            _ => None,
        }
    }

    /// The error name of an error.
    pub fn error_name(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::Error { error_name, .. } => Some(error_name),
            _ => None,
        }
    }

    /// The serial a method return or error is replying to.
    pub fn reply_serial(&self) -> Option<NonZeroU32> {
        match self.kind {
            MessageKind::MethodReturn { reply_serial }
            | MessageKind::Error { reply_serial, .. } => Some(reply_serial),
            _ => None,
        }
    }

    /// Get the serial of the message.
    #[inline]
    pub fn serial(&self) -> NonZeroU32 {
        self.serial
    }

    /// Modify the serial of the message.
    pub fn with_serial(self, serial: NonZeroU32) -> Self {
        Self { serial, ..self }
    }

    /// Get the flags of the message.
    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Modify the flags of the message.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroU32;
    ///
    /// use tokio_dbus_wire::{Message, ObjectPath};
    /// use tokio_dbus_wire::proto::Flags;
    ///
    /// let m = Message::method_call(ObjectPath::ROOT, "Hello", NonZeroU32::MIN);
    /// assert_eq!(m.flags(), Flags::default());
    /// assert!(m.is_reply_expected());
    ///
    /// let m2 = m.with_flags(Flags::NO_REPLY_EXPECTED);
    /// assert_eq!(m2.flags(), Flags::NO_REPLY_EXPECTED);
    /// assert!(!m2.is_reply_expected());
    /// ```
    pub fn with_flags(self, flags: Flags) -> Self {
        Self { flags, ..self }
    }

    /// Test if this is a method call which expects a reply.
    pub fn is_reply_expected(&self) -> bool {
        matches!(self.kind, MessageKind::MethodCall { .. })
            && !(self.flags & Flags::NO_REPLY_EXPECTED)
    }

    /// Get the interface of the message.
    #[inline]
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// Modify the interface of the message.
    pub fn with_interface(self, interface: &str) -> Self {
        Self {
            interface: Some(interface.into()),
            ..self
        }
    }

    /// Get the destination of the message.
    #[inline]
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Modify the destination of the message.
    pub fn with_destination(self, destination: &str) -> Self {
        Self {
            destination: Some(destination.into()),
            ..self
        }
    }

    /// Get the sender of the message.
    #[inline]
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Modify the sender of the message.
    pub fn with_sender(self, sender: &str) -> Self {
        Self {
            sender: Some(sender.into()),
            ..self
        }
    }

    /// The number of unix file descriptors declared by the message.
    #[inline]
    pub fn unix_fds(&self) -> Option<u32> {
        self.unix_fds
    }

    /// Modify the number of unix file descriptors declared by the message.
    pub fn with_unix_fds(self, unix_fds: u32) -> Self {
        Self {
            unix_fds: Some(unix_fds),
            ..self
        }
    }

    /// The endianness of the message.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Get the signature of the body.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Get a reader over the body of the message.
    #[inline]
    pub fn body(&self) -> Body<'_> {
        Body::new(&self.body, self.endianness, &self.signature)
    }

    /// Replace the body and signature of the message with the content of a
    /// [`BodyBuf`].
    ///
    /// The message takes on the endianness of the body.
    pub fn with_body(self, body: BodyBuf) -> Self {
        let endianness = body.endianness();
        let (body, signature) = body.into_parts();

        Self {
            body: body.into(),
            signature,
            endianness,
            ..self
        }
    }
}
