use crate::buf::AlignedBuf;
use crate::error::{ErrorKind, Result};
use crate::{ObjectPath, OwnedObjectPath, OwnedSignature, Signature};

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Trait used for types which can be stored with a [`BodyBuf::store`] call.
///
/// [`BodyBuf::store`]: crate::BodyBuf::store
pub trait Storable: self::sealed::Sealed {
    /// The signature of the stored value.
    const SIGNATURE: &'static Signature;

    /// Store the value into a buffer.
    ///
    /// Nothing may be written to the buffer if this returns an error.
    #[doc(hidden)]
    fn store_to(self, buf: &mut AlignedBuf) -> Result<()>;
}

storable_frame!(u8, i16, u16, i32, u32, i64, u64, f64);

impl self::sealed::Sealed for bool {}

/// Booleans are stored as a 32-bit value which is either 0 or 1.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::BodyBuf;
/// use tokio_dbus_wire::proto::Endianness;
///
/// let mut body = BodyBuf::with_endianness(Endianness::LITTLE);
/// body.store(true)?;
///
/// assert_eq!(body.signature(), "b");
/// assert_eq!(body.get(), &[1, 0, 0, 0]);
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
impl Storable for bool {
    const SIGNATURE: &'static Signature = Signature::BOOLEAN;

    #[inline]
    fn store_to(self, buf: &mut AlignedBuf) -> Result<()> {
        buf.store(u32::from(self));
        Ok(())
    }
}

impl self::sealed::Sealed for &str {}

/// Strings are stored length prefixed and nul terminated.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::BodyBuf;
///
/// let mut body = BodyBuf::new();
/// assert!(body.store("foo\0bar").is_err());
/// assert!(body.is_empty());
/// assert_eq!(body.signature(), "");
/// ```
impl Storable for &str {
    const SIGNATURE: &'static Signature = Signature::STRING;

    #[inline]
    fn store_to(self, buf: &mut AlignedBuf) -> Result<()> {
        if self.as_bytes().contains(&0) {
            return Err(ErrorKind::InteriorNul.into());
        }

        buf.write(self);
        Ok(())
    }
}

impl self::sealed::Sealed for &String {}

impl Storable for &String {
    const SIGNATURE: &'static Signature = Signature::STRING;

    #[inline]
    fn store_to(self, buf: &mut AlignedBuf) -> Result<()> {
        self.as_str().store_to(buf)
    }
}

impl self::sealed::Sealed for &ObjectPath {}

impl Storable for &ObjectPath {
    const SIGNATURE: &'static Signature = Signature::OBJECT_PATH;

    #[inline]
    fn store_to(self, buf: &mut AlignedBuf) -> Result<()> {
        buf.write(self);
        Ok(())
    }
}

impl self::sealed::Sealed for &OwnedObjectPath {}

impl Storable for &OwnedObjectPath {
    const SIGNATURE: &'static Signature = Signature::OBJECT_PATH;

    #[inline]
    fn store_to(self, buf: &mut AlignedBuf) -> Result<()> {
        buf.write(&**self);
        Ok(())
    }
}

impl self::sealed::Sealed for &Signature {}

impl Storable for &Signature {
    const SIGNATURE: &'static Signature = Signature::SIGNATURE;

    #[inline]
    fn store_to(self, buf: &mut AlignedBuf) -> Result<()> {
        buf.write(self);
        Ok(())
    }
}

impl self::sealed::Sealed for &OwnedSignature {}

impl Storable for &OwnedSignature {
    const SIGNATURE: &'static Signature = Signature::SIGNATURE;

    #[inline]
    fn store_to(self, buf: &mut AlignedBuf) -> Result<()> {
        buf.write(&**self);
        Ok(())
    }
}
