use std::ops::{Deref, DerefMut};

use crate::error::{Error, ErrorKind, Result};

use super::{AlignedBuf, Alloc, MAX_ARRAY_LENGTH};

/// Write an array into an [`AlignedBuf`].
///
/// The writer dereferences to the buffer being written to. Elements are
/// written directly into it and the length prefix is filled in by
/// [`ArrayWriter::finish`].
#[must_use = "Arrays must be finalized using ArrayWriter::finish"]
pub struct ArrayWriter<'a> {
    buf: &'a mut AlignedBuf,
    len: Alloc<u32>,
    start: usize,
}

impl<'a> ArrayWriter<'a> {
    pub(super) fn new(buf: &'a mut AlignedBuf, alignment: usize) -> Self {
        let len = buf.alloc::<u32>();
        // NB: Padding up to the first element is not part of the array
        // length, even when the array is empty.
        buf.align_mut(alignment);
        let start = buf.len();
        Self { buf, len, start }
    }

    /// Finish writing the array.
    ///
    /// # Errors
    ///
    /// Errors if the array is longer than the protocol allows.
    pub fn finish(self) -> Result<()> {
        let len = self.buf.len() - self.start;

        let len = match u32::try_from(len) {
            Ok(len) if len <= MAX_ARRAY_LENGTH => len,
            _ => {
                return Err(Error::new(ErrorKind::ArrayTooLong(
                    u32::try_from(len).unwrap_or(u32::MAX),
                )))
            }
        };

        self.buf.store_at(self.len, len);
        Ok(())
    }
}

impl Deref for ArrayWriter<'_> {
    type Target = AlignedBuf;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.buf
    }
}

impl DerefMut for ArrayWriter<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buf
    }
}
