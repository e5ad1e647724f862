use std::fmt;
use std::marker::PhantomData;

use crate::proto::{Endianness, Type};
use crate::utils::padding_to;
use crate::{Frame, Signature, Write};

use super::ArrayWriter;

/// A growable buffer which keeps track of alignment relative to its start.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::buf::AlignedBuf;
/// use tokio_dbus_wire::proto::Endianness;
///
/// let mut buf = AlignedBuf::with_endianness(Endianness::LITTLE);
/// buf.store(1u8);
/// buf.store(2u32);
///
/// assert_eq!(buf.get(), &[1, 0, 0, 0, 2, 0, 0, 0]);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AlignedBuf {
    data: Vec<u8>,
    endianness: Endianness,
}

impl AlignedBuf {
    /// Construct a new empty buffer in native endianness.
    pub const fn new() -> Self {
        Self::with_endianness(Endianness::NATIVE)
    }

    /// Construct a new empty buffer with the given endianness.
    pub const fn with_endianness(endianness: Endianness) -> Self {
        Self {
            data: Vec::new(),
            endianness,
        }
    }

    /// The endianness of the buffer.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Get the bytes written to the buffer.
    #[inline]
    pub fn get(&self) -> &[u8] {
        &self.data
    }

    /// The number of bytes written.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Test if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear the buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Truncate the buffer to `len` bytes, discarding a partial write.
    #[inline]
    pub(crate) fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Convert into the underlying vector.
    #[inline]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Pad the buffer with zeros up to the given alignment.
    #[inline]
    pub fn align_mut(&mut self, alignment: usize) {
        let padding = padding_to(self.data.len(), alignment);
        self.data.resize(self.data.len() + padding, 0);
    }

    /// Align for and store a [`Frame`].
    pub fn store<T>(&mut self, value: T)
    where
        T: Frame,
    {
        self.align_mut(T::SIZE);
        let start = self.data.len();
        self.data.resize(start + T::SIZE, 0);
        value.write_to(&mut self.data[start..], self.endianness);
    }

    /// Write a value which might be unsized, such as a string.
    #[inline]
    pub fn write<T>(&mut self, value: &T)
    where
        T: ?Sized + Write,
    {
        value.write_to(self);
    }

    /// Allocate space for a [`Frame`] to be filled in later.
    pub(crate) fn alloc<T>(&mut self) -> Alloc<T>
    where
        T: Frame,
    {
        self.align_mut(T::SIZE);
        let at = self.data.len();
        self.data.resize(at + T::SIZE, 0);
        Alloc {
            at,
            _marker: PhantomData,
        }
    }

    /// Fill in a previously allocated [`Frame`].
    pub(crate) fn store_at<T>(&mut self, alloc: Alloc<T>, value: T)
    where
        T: Frame,
    {
        let range = alloc.at..alloc.at + T::SIZE;
        value.write_to(&mut self.data[range], self.endianness);
    }

    /// Extend the buffer with raw bytes.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Extend the buffer with raw bytes followed by a nul terminator.
    #[inline]
    pub(crate) fn extend_from_slice_nul(&mut self, bytes: &[u8]) {
        self.data.reserve(bytes.len() + 1);
        self.data.extend_from_slice(bytes);
        self.data.push(0);
    }

    /// Begin writing an array whose elements start with the given type code.
    ///
    /// The array must be completed with [`ArrayWriter::finish`].
    pub fn write_array(&mut self, element: &Signature) -> ArrayWriter<'_> {
        let alignment = match element.as_bytes().first() {
            Some(&b) => Type::new(b).alignment(),
            None => 1,
        };

        ArrayWriter::new(self, alignment)
    }

    /// Begin writing a struct or dict entry, which are aligned to 8 bytes.
    #[inline]
    pub fn write_struct(&mut self) -> &mut Self {
        self.align_mut(8);
        self
    }
}

impl fmt::Debug for AlignedBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("endianness", &self.endianness)
            .field("data", &self.data)
            .finish()
    }
}

/// A reserved position inside of an [`AlignedBuf`].
#[must_use = "Allocations must be filled in with AlignedBuf::store_at"]
pub(crate) struct Alloc<T> {
    at: usize,
    _marker: PhantomData<T>,
}

impl<T> Clone for Alloc<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Alloc<T> {}
