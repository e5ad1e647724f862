use crate::buf::AlignedBuf;
use crate::{ObjectPath, Signature};

mod sealed {
    use crate::{ObjectPath, Signature};

    pub trait Sealed {}

    impl Sealed for Signature {}
    impl Sealed for ObjectPath {}
    impl Sealed for str {}
}

/// An unsized element that can be written to a buffer.
pub trait Write: self::sealed::Sealed {
    /// The signature of the type.
    const SIGNATURE: &'static Signature;

    /// Write `self` into `buf`.
    #[doc(hidden)]
    fn write_to(&self, buf: &mut AlignedBuf);
}

/// Write a length-prefixed string to the buffer.
///
/// Interior nul bytes are not checked here, see [`BodyBuf::store`].
///
/// [`BodyBuf::store`]: crate::BodyBuf::store
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::buf::AlignedBuf;
/// use tokio_dbus_wire::proto::Endianness;
///
/// let mut buf = AlignedBuf::with_endianness(Endianness::LITTLE);
/// buf.write("foo");
///
/// assert_eq!(buf.get(), &[3, 0, 0, 0, 102, 111, 111, 0])
/// ```
impl Write for str {
    const SIGNATURE: &'static Signature = Signature::STRING;

    #[inline]
    fn write_to(&self, buf: &mut AlignedBuf) {
        buf.store(self.len() as u32);
        buf.extend_from_slice_nul(self.as_bytes());
    }
}

/// Write a signature to the buffer, which is prefixed with a single byte
/// length.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::buf::AlignedBuf;
/// use tokio_dbus_wire::Signature;
///
/// let mut buf = AlignedBuf::new();
/// buf.write(Signature::new(b"ai")?);
///
/// assert_eq!(buf.get(), &[2, b'a', b'i', 0]);
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
impl Write for Signature {
    const SIGNATURE: &'static Signature = Signature::SIGNATURE;

    #[inline]
    fn write_to(&self, buf: &mut AlignedBuf) {
        buf.store(self.len() as u8);
        buf.extend_from_slice_nul(self.as_bytes());
    }
}

impl Write for ObjectPath {
    const SIGNATURE: &'static Signature = Signature::OBJECT_PATH;

    #[inline]
    fn write_to(&self, buf: &mut AlignedBuf) {
        buf.store(self.as_bytes().len() as u32);
        buf.extend_from_slice_nul(self.as_bytes());
    }
}
