use tokio::io::Interest;
use tokio::sync::mpsc;

use crate::codec::encode;
use crate::error::{Error, ErrorKind, Result};
use crate::transport::{CloseHandle, Stream};
use crate::{FrameAssembler, Message};

/// Size of the scratch buffer used for each read.
const SCRATCH: usize = 4096;

/// Receiver of the events produced by an [`IoLoop`].
pub(crate) trait Dispatch: Send + 'static {
    /// Handle a complete message received from the peer.
    fn dispatch(&mut self, message: Message);

    /// An outgoing message could not be encoded and was dropped.
    fn send_failed(&mut self, message: &Message, error: Error);

    /// A malformed message was received.
    ///
    /// Returning an error closes the connection.
    fn malformed(&mut self, error: Error) -> Result<()> {
        tracing::warn!(%error, "dropping malformed message");
        Ok(())
    }

    /// The loop has stopped, either because it was closed or because of the
    /// given error.
    fn closed(&mut self, error: Option<&Error>);
}

/// The readiness driven loop of a single connection.
///
/// Reads are fed into a [`FrameAssembler`] and every complete message is
/// handed to the [`Dispatch`]. Outgoing messages are taken off the queue one
/// at a time, and the next one is only taken once the previous one has been
/// written in full.
pub(crate) struct IoLoop<D> {
    stream: Stream,
    assembler: FrameAssembler,
    leftover: Vec<u8>,
    outgoing: mpsc::UnboundedReceiver<Message>,
    close: CloseHandle,
    dispatch: D,
    send: Vec<u8>,
    written: usize,
}

impl<D> IoLoop<D>
where
    D: Dispatch,
{
    /// Construct a new loop.
    ///
    /// The `leftover` bytes were received during authentication and are
    /// processed before anything else is read.
    pub(crate) fn new(
        stream: Stream,
        leftover: Vec<u8>,
        outgoing: mpsc::UnboundedReceiver<Message>,
        close: CloseHandle,
        dispatch: D,
    ) -> Self {
        Self {
            stream,
            assembler: FrameAssembler::new(),
            leftover,
            outgoing,
            close,
            dispatch,
            send: Vec::new(),
            written: 0,
        }
    }

    /// Run the loop until the connection is closed.
    pub(crate) async fn run(mut self) {
        let result = self.run_inner().await;

        match &result {
            Ok(()) => tracing::debug!("connection closed"),
            Err(error) if error.is_connection_closed() => {
                tracing::debug!("connection closed by peer")
            }
            Err(error) => tracing::warn!(%error, "connection failed"),
        }

        self.close.close();
        self.dispatch.closed(result.as_ref().err());
    }

    async fn run_inner(&mut self) -> Result<()> {
        let leftover = std::mem::take(&mut self.leftover);

        if !leftover.is_empty() {
            self.feed(&leftover)?;
        }

        let mut scratch = [0; SCRATCH];

        loop {
            let mut interest = Interest::READABLE;

            if self.has_pending() {
                interest |= Interest::WRITABLE;
            }

            tokio::select! {
                _ = self.close.closed() => {
                    return Ok(());
                }
                message = self.outgoing.recv(), if !self.has_pending() => {
                    let Some(message) = message else {
                        return Ok(());
                    };

                    self.enqueue(message);
                }
                ready = self.stream.ready(interest) => {
                    let ready = ready?;

                    if ready.is_readable() || ready.is_read_closed() {
                        self.read(&mut scratch)?;
                    }

                    if ready.is_writable() && self.has_pending() {
                        self.write()?;
                    }
                }
            }
        }
    }

    #[inline]
    fn has_pending(&self) -> bool {
        self.written < self.send.len()
    }

    fn enqueue(&mut self, message: Message) {
        match encode(&message) {
            Ok(bytes) => {
                tracing::trace!(serial = message.serial().get(), len = bytes.len(), "send");
                self.send = bytes;
                self.written = 0;
            }
            Err(error) => {
                tracing::warn!(serial = message.serial().get(), %error, "failed to encode message");
                self.dispatch.send_failed(&message, error);
            }
        }
    }

    fn read(&mut self, scratch: &mut [u8]) -> Result<()> {
        let n = match self.stream.try_read(scratch) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if n == 0 {
            return Err(Error::new(ErrorKind::ConnectionClosed));
        }

        self.feed(&scratch[..n])
    }

    fn feed(&mut self, bytes: &[u8]) -> Result<()> {
        for result in self.assembler.feed(bytes) {
            match result {
                Ok(message) => {
                    tracing::trace!(serial = message.serial().get(), kind = ?message.message_type(), "recv");
                    self.dispatch.dispatch(message);
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => self.dispatch.malformed(error)?,
            }
        }

        Ok(())
    }

    /// Write as much of the pending message as the socket accepts.
    fn write(&mut self) -> Result<()> {
        while self.has_pending() {
            match self.stream.try_write(&self.send[self.written..]) {
                Ok(0) => {
                    return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
                }
                Ok(n) => {
                    self.written += n;
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }

        self.send.clear();
        self.written = 0;
        Ok(())
    }
}
