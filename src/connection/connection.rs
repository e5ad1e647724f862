use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, ErrorKind, Result};
use crate::org_freedesktop_dbus::{self, NameFlag, NameReply, ReleaseNameReply};
use crate::proto::MessageType;
use crate::sasl::Guid;
use crate::transport::{CloseHandle, Stream};
use crate::{BodyBuf, Message, MessageKind, ObjectPath, SerialCounter};

use super::io_loop::{Dispatch, IoLoop};
use super::ConnectionBuilder;

const DBUS_PATH: &ObjectPath = ObjectPath::new_const(b"/org/freedesktop/DBus");

type Waiter = oneshot::Sender<Result<Message>>;

#[derive(Default)]
struct Pending {
    calls: HashMap<NonZeroU32, Waiter>,
    closed: bool,
}

/// An asynchronous D-Bus connection.
///
/// Messages are written and read by a background task. Replies to calls made
/// through [`Connection::call`] are routed back to the caller, while every
/// other message is delivered through [`Connection::recv`].
///
/// # Examples
///
/// ```no_run
/// use tokio_dbus_wire::{Connection, ObjectPath};
///
/// # #[tokio::main] async fn main() -> tokio_dbus_wire::Result<()> {
/// let c = Connection::session_bus().await?;
///
/// let m = c
///     .method_call(ObjectPath::new("/org/freedesktop/DBus")?, "GetId")
///     .with_interface("org.freedesktop.DBus")
///     .with_destination("org.freedesktop.DBus");
///
/// let reply = c.call(m).await?;
/// let id = reply.body().read::<str>()?;
/// println!("bus id: {id}");
/// # Ok(()) }
/// ```
pub struct Connection {
    outgoing: mpsc::UnboundedSender<Message>,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
    pending: Arc<Mutex<Pending>>,
    close: CloseHandle,
    serials: SerialCounter,
    guid: Option<Guid>,
    unique_name: Option<Box<str>>,
    call_timeout: Duration,
}

impl Connection {
    /// Spawn the I/O loop of an authenticated stream.
    pub(crate) fn spawn(
        stream: Stream,
        leftover: Vec<u8>,
        guid: Option<Guid>,
        call_timeout: Duration,
    ) -> Self {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(Pending::default()));
        let close = CloseHandle::new();

        let dispatch = ClientDispatch {
            pending: pending.clone(),
            incoming: incoming_tx,
        };

        let io = IoLoop::new(stream, leftover, outgoing_rx, close.clone(), dispatch);
        tokio::spawn(io.run());

        Self {
            outgoing,
            incoming: tokio::sync::Mutex::new(incoming),
            pending,
            close,
            serials: SerialCounter::new(),
            guid,
            unique_name: None,
            call_timeout,
        }
    }

    /// Shorthand for connecting to the session bus using the default
    /// configuration.
    #[inline]
    pub async fn session_bus() -> Result<Self> {
        ConnectionBuilder::new().session_bus().build().await
    }

    /// Shorthand for connecting to the system bus using the default
    /// configuration.
    #[inline]
    pub async fn system_bus() -> Result<Self> {
        ConnectionBuilder::new().system_bus().build().await
    }

    /// The GUID of the server, if authentication was performed.
    pub fn guid(&self) -> Option<Guid> {
        self.guid
    }

    /// The unique name assigned by the bus through `Hello`.
    pub fn unique_name(&self) -> Option<&str> {
        self.unique_name.as_deref()
    }

    /// Allocate the next serial of this connection.
    pub fn next_serial(&self) -> NonZeroU32 {
        self.serials.next()
    }

    /// Construct a method call using the next serial of this connection.
    pub fn method_call(&self, path: &ObjectPath, member: &str) -> Message {
        Message::method_call(path, member, self.next_serial())
    }

    /// A handle which can close this connection from another task.
    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Close the connection.
    ///
    /// Callers waiting for replies fail with a connection closed error.
    pub fn close(&self) {
        self.close.close();
    }

    /// Test if the connection is closed.
    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }

    /// Queue a message to be sent without waiting for a reply.
    pub fn send(&self, message: Message) -> Result<()> {
        if self.outgoing.send(message).is_err() {
            return Err(Error::new(ErrorKind::ConnectionClosed));
        }

        Ok(())
    }

    /// Send a method call and wait for its reply using the default call
    /// timeout.
    ///
    /// An `ERROR` reply is returned as an error, see [`Error::response_error`].
    pub async fn call(&self, message: Message) -> Result<Message> {
        self.call_with_timeout(message, self.call_timeout).await
    }

    /// Send a method call and wait for its reply for at most `timeout`.
    pub async fn call_with_timeout(&self, message: Message, timeout: Duration) -> Result<Message> {
        let serial = message.serial();
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock();

            if pending.closed {
                return Err(Error::new(ErrorKind::ConnectionClosed));
            }

            pending.calls.insert(serial, tx);
        }

        if let Err(error) = self.send(message) {
            self.pending.lock().calls.remove(&serial);
            return Err(error);
        }

        let reply = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply?,
            Ok(Err(..)) => return Err(Error::new(ErrorKind::ConnectionClosed)),
            Err(..) => {
                self.pending.lock().calls.remove(&serial);
                tracing::debug!(serial = serial.get(), "call timed out");
                return Err(Error::new(ErrorKind::Timeout));
            }
        };

        if reply.message_type() == MessageType::ERROR {
            let name = reply.error_name().unwrap_or_default();

            let text = match reply.signature().as_bytes().first() {
                Some(b's') => reply.body().read::<str>()?.to_owned(),
                _ => String::new(),
            };

            return Err(Error::new(ErrorKind::ResponseError(name.into(), text.into())));
        }

        Ok(reply)
    }

    /// Wait for the next message which is not a reply to a call made through
    /// this connection.
    pub async fn recv(&self) -> Result<Message> {
        let mut incoming = self.incoming.lock().await;

        match incoming.recv().await {
            Some(message) => Ok(message),
            None => Err(Error::new(ErrorKind::ConnectionClosed)),
        }
    }

    fn bus_call(&self, member: &str) -> Message {
        self.method_call(DBUS_PATH, member)
            .with_interface(org_freedesktop_dbus::INTERFACE)
            .with_destination(org_freedesktop_dbus::DESTINATION)
    }

    /// Call `Hello` on the bus and remember the unique name it assigns.
    pub async fn hello(&mut self) -> Result<&str> {
        let reply = self.call(self.bus_call("Hello")).await?;
        let name = reply.body().read::<str>()?;
        tracing::debug!(name, "assigned unique name");
        let name: &str = self.unique_name.insert(name.into());
        Ok(name)
    }

    /// Request ownership of a well-known name.
    pub async fn request_name(&self, name: &str, flags: NameFlag) -> Result<NameReply> {
        let mut body = BodyBuf::new();
        body.store(name)?;
        body.store(flags)?;

        let reply = self.call(self.bus_call("RequestName").with_body(body)).await?;
        let reply = reply.body().load::<NameReply>()?;
        Ok(reply)
    }

    /// Release ownership of a well-known name.
    pub async fn release_name(&self, name: &str) -> Result<ReleaseNameReply> {
        let mut body = BodyBuf::new();
        body.store(name)?;

        let reply = self.call(self.bus_call("ReleaseName").with_body(body)).await?;
        let reply = reply.body().load::<ReleaseNameReply>()?;
        Ok(reply)
    }

    /// Add a match rule selecting which broadcast signals are received.
    pub async fn add_match(&self, rule: &str) -> Result<()> {
        let mut body = BodyBuf::new();
        body.store(rule)?;
        self.call(self.bus_call("AddMatch").with_body(body)).await?;
        Ok(())
    }
}

impl Drop for Connection {
    #[inline]
    fn drop(&mut self) {
        self.close.close();
    }
}

/// Routes replies to their callers and everything else to
/// [`Connection::recv`].
struct ClientDispatch {
    pending: Arc<Mutex<Pending>>,
    incoming: mpsc::UnboundedSender<Message>,
}

impl Dispatch for ClientDispatch {
    fn dispatch(&mut self, message: Message) {
        let waiter = match message.kind() {
            MessageKind::MethodReturn { reply_serial }
            | MessageKind::Error { reply_serial, .. } => {
                self.pending.lock().calls.remove(reply_serial)
            }
            _ => None,
        };

        if let Some(waiter) = waiter {
            // The caller may have given up waiting.
            _ = waiter.send(Ok(message));
            return;
        }

        if self.incoming.send(message).is_err() {
            tracing::trace!("dropping message, nobody is receiving");
        }
    }

    fn send_failed(&mut self, message: &Message, error: Error) {
        if let Some(waiter) = self.pending.lock().calls.remove(&message.serial()) {
            _ = waiter.send(Err(error));
        }
    }

    fn closed(&mut self, _: Option<&Error>) {
        let calls = {
            let mut pending = self.pending.lock();
            pending.closed = true;
            std::mem::take(&mut pending.calls)
        };

        for (_, waiter) in calls {
            _ = waiter.send(Err(Error::new(ErrorKind::ConnectionClosed)));
        }
    }
}
