//! Incremental reassembly of messages from a byte stream.

#[cfg(test)]
mod tests;

use std::fmt;

use crate::codec::{decode_parts, FixedHeader};
use crate::error::{Error, ErrorKind, Result};
use crate::proto::{FIXED_HEADER_LENGTH, PREAMBLE_LENGTH};
use crate::utils::align_up;
use crate::Message;

/// The stage a [`FrameAssembler`] is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Stage {
    /// Waiting for the 12 byte fixed header.
    Preamble,
    /// Waiting for the 4 byte length of the header field array.
    HeaderLength,
    /// Waiting for the header fields, padded to 8 bytes.
    Header,
    /// Waiting for the body.
    Body,
    /// A fatal error has been encountered, and the stream must be closed.
    Poisoned,
}

#[derive(Clone, Copy)]
enum State {
    Preamble,
    HeaderLength(FixedHeader),
    Header(FixedHeader, u32),
    Body(FixedHeader, u32),
    Poisoned,
}

/// Reassembles complete messages out of bytes received in chunks of any
/// size.
///
/// Every byte of a partially received frame is retained until the frame is
/// complete. Errors which make it impossible to find where the next frame
/// starts, like an unsupported protocol version, poison the assembler. Once
/// poisoned no more bytes are buffered and the connection has to be closed.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::{codec, FrameAssembler, Message, ObjectPath, SerialCounter};
///
/// let serials = SerialCounter::new();
/// let m = Message::method_call(ObjectPath::ROOT, "Ping", serials.next());
/// let bytes = codec::encode(&m)?;
///
/// let mut assembler = FrameAssembler::new();
///
/// let (head, tail) = bytes.split_at(10);
/// assert_eq!(assembler.feed(head).count(), 0);
///
/// let frames = assembler.feed(tail).collect::<Result<Vec<_>, _>>()?;
/// assert_eq!(frames, [m]);
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
pub struct FrameAssembler {
    buf: Vec<u8>,
    /// Start of the frame currently being assembled.
    start: usize,
    state: State,
}

impl FrameAssembler {
    /// Construct a new empty assembler.
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            start: 0,
            state: State::Preamble,
        }
    }

    /// Feed bytes into the assembler.
    ///
    /// The returned iterator lazily produces every message which can be
    /// completed with the bytes received so far. Bytes which are not consumed
    /// by the time the iterator is dropped are kept for the next call.
    ///
    /// A malformed message produces an error without affecting subsequent
    /// messages. A fatal error is produced at most once, after which feeding
    /// more bytes produces a single [`Error::is_fatal`] error.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        if matches!(self.state, State::Poisoned) {
            return Frames {
                assembler: self,
                report_poisoned: true,
            };
        }

        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }

        self.buf.extend_from_slice(bytes);

        Frames {
            assembler: self,
            report_poisoned: false,
        }
    }

    /// The stage of the frame currently being assembled.
    pub fn stage(&self) -> Stage {
        match self.state {
            State::Preamble => Stage::Preamble,
            State::HeaderLength(..) => Stage::HeaderLength,
            State::Header(..) => Stage::Header,
            State::Body(..) => Stage::Body,
            State::Poisoned => Stage::Poisoned,
        }
    }

    /// The number of bytes buffered which have not yet formed a complete
    /// message.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Test if the assembler has been poisoned by a fatal error.
    pub fn is_poisoned(&self) -> bool {
        matches!(self.state, State::Poisoned)
    }

    fn poison(&mut self, error: Error) -> Option<Result<Message>> {
        self.state = State::Poisoned;
        self.buf = Vec::new();
        self.start = 0;
        Some(Err(error))
    }

    fn advance(&mut self) -> Option<Result<Message>> {
        loop {
            let frame = &self.buf[self.start..];

            match self.state {
                State::Preamble => {
                    let fixed = frame.get(..FIXED_HEADER_LENGTH)?;

                    match FixedHeader::parse(fixed) {
                        Ok(fixed) => {
                            self.state = State::HeaderLength(fixed);
                        }
                        Err(error) => return self.poison(error),
                    }
                }
                State::HeaderLength(fixed) => {
                    let length = frame.get(FIXED_HEADER_LENGTH..PREAMBLE_LENGTH)?;

                    match fixed.header_length(length) {
                        Ok(length) => {
                            self.state = State::Header(fixed, length);
                        }
                        Err(error) => return self.poison(error),
                    }
                }
                State::Header(fixed, length) => {
                    let end = PREAMBLE_LENGTH + align_up(length as usize, 8);

                    if frame.len() < end {
                        return None;
                    }

                    self.state = State::Body(fixed, length);
                }
                State::Body(fixed, length) => {
                    let header_end = PREAMBLE_LENGTH + align_up(length as usize, 8);
                    let end = header_end + fixed.body_length as usize;

                    let frame = frame.get(..end)?;

                    let result = decode_parts(
                        fixed,
                        &frame[PREAMBLE_LENGTH..PREAMBLE_LENGTH + length as usize],
                        &frame[header_end..],
                    );

                    self.start += end;
                    self.state = State::Preamble;
                    return Some(result);
                }
                State::Poisoned => return None,
            }
        }
    }
}

impl Default for FrameAssembler {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameAssembler {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameAssembler")
            .field("stage", &self.stage())
            .field("buffered", &self.buffered())
            .finish()
    }
}

/// The messages completed by a call to [`FrameAssembler::feed`].
pub struct Frames<'a> {
    assembler: &'a mut FrameAssembler,
    report_poisoned: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.report_poisoned {
            self.report_poisoned = false;
            return Some(Err(Error::new(ErrorKind::AssemblerPoisoned)));
        }

        self.assembler.advance()
    }
}
