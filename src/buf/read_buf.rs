use std::fmt;

use crate::error::{Error, ErrorKind, Result};
use crate::proto::Endianness;
use crate::utils::padding_to;
use crate::{Frame, Read};

/// A read-only cursor over protocol bytes.
///
/// Alignment is computed relative to the start of the region the cursor was
/// originally constructed over, so sub-cursors created with
/// [`ReadBuf::read_until`] keep the alignment of their parent.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::buf::ReadBuf;
/// use tokio_dbus_wire::proto::Endianness;
///
/// let mut buf = ReadBuf::new(b"\x07\x00\x00\x00foo bar\x00", Endianness::LITTLE);
/// assert_eq!(buf.read::<str>()?, "foo bar");
/// assert!(buf.is_empty());
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Clone)]
pub struct ReadBuf<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
    endianness: Endianness,
}

impl<'a> ReadBuf<'a> {
    /// Construct a new read buffer over the given bytes.
    pub const fn new(data: &'a [u8], endianness: Endianness) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
            endianness,
        }
    }

    /// The endianness of the buffer.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// The number of bytes remaining.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.pos
    }

    /// Test if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.end
    }

    /// Get the remaining bytes.
    #[inline]
    pub fn get(&self) -> &'a [u8] {
        &self.data[self.pos..self.end]
    }

    /// Skip over padding up to the given alignment.
    ///
    /// Padding content is not verified.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = padding_to(self.pos, alignment);
        self.advance(padding)
    }

    /// Advance the buffer by `n` bytes.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        if n > self.len() {
            return Err(Error::new(ErrorKind::BufferUnderflow));
        }

        self.pos += n;
        Ok(())
    }

    /// Align for and load a [`Frame`].
    pub fn load<T>(&mut self) -> Result<T>
    where
        T: Frame,
    {
        self.align(T::SIZE)?;
        let bytes = self.load_slice(T::SIZE)?;
        Ok(T::read_from(bytes, self.endianness))
    }

    /// Read an unsized value, like a string.
    #[inline]
    pub fn read<T>(&mut self) -> Result<&'a T>
    where
        T: ?Sized + Read,
    {
        T::read_from(self)
    }

    /// Load a slice of `n` bytes.
    pub fn load_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.len() {
            return Err(Error::new(ErrorKind::BufferUnderflow));
        }

        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    /// Load a slice of `n` bytes which is followed by a nul terminator.
    pub(crate) fn load_slice_nul(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self.load_slice(n)?;

        if self.load_slice(1)? != b"\0" {
            return Err(Error::new(ErrorKind::NotNullTerminated));
        }

        Ok(bytes)
    }

    /// Split off a cursor covering the next `n` bytes and advance past them.
    pub fn read_until(&mut self, n: usize) -> Result<ReadBuf<'a>> {
        if n > self.len() {
            return Err(Error::new(ErrorKind::BufferUnderflow));
        }

        let sub = ReadBuf {
            data: self.data,
            pos: self.pos,
            end: self.pos + n,
            endianness: self.endianness,
        };

        self.pos += n;
        Ok(sub)
    }
}

impl fmt::Debug for ReadBuf<'_> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadBuf")
            .field("pos", &self.pos)
            .field("end", &self.end)
            .field("endianness", &self.endianness)
            .finish()
    }
}
