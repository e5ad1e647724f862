use std::fmt;
use std::str::from_utf8_unchecked;

use crate::proto::Type;
use crate::OwnedSignature;

use super::{validate, Iter, SignatureError, SignatureErrorKind};

/// A D-Bus signature.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::Signature;
///
/// const SIG: &Signature = Signature::new_const(b"aaaai");
///
/// assert!(Signature::new(b"aai").is_ok());
/// assert!(Signature::new(b"a{vs}").is_err());
/// ```
#[derive(Hash, PartialEq, Eq)]
#[repr(transparent)]
pub struct Signature([u8]);

impl Signature {
    /// The empty signature.
    pub const EMPTY: &'static Signature = Signature::new_const(b"");

    /// A signature.
    pub const SIGNATURE: &'static Signature = Signature::new_const(b"g");

    /// A object path.
    pub const OBJECT_PATH: &'static Signature = Signature::new_const(b"o");

    /// A string.
    pub const STRING: &'static Signature = Signature::new_const(b"s");

    /// A variant.
    pub const VARIANT: &'static Signature = Signature::new_const(b"v");

    /// A single byte.
    pub const BYTE: &'static Signature = Signature::new_const(b"y");

    /// A boolean, encoded as a 32-bit value that is either 0 or 1.
    pub const BOOLEAN: &'static Signature = Signature::new_const(b"b");

    /// Signed (two's complement) 16-bit integer.
    pub const INT16: &'static Signature = Signature::new_const(b"n");

    /// Unsigned 16-bit integer.
    pub const UINT16: &'static Signature = Signature::new_const(b"q");

    /// Signed (two's complement) 32-bit integer.
    pub const INT32: &'static Signature = Signature::new_const(b"i");

    /// Unsigned 32-bit integer.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::{BodyBuf, Signature};
    ///
    /// let mut body = BodyBuf::new();
    ///
    /// body.store(10u32)?;
    ///
    /// assert_eq!(body.signature(), Signature::UINT32);
    /// # Ok::<_, tokio_dbus_wire::Error>(())
    /// ```
    pub const UINT32: &'static Signature = Signature::new_const(b"u");

    /// Signed (two's complement) 64-bit integer.
    pub const INT64: &'static Signature = Signature::new_const(b"x");

    /// Unsigned 64-bit integer.
    pub const UINT64: &'static Signature = Signature::new_const(b"t");

    /// IEEE 754 double-precision floating point.
    pub const DOUBLE: &'static Signature = Signature::new_const(b"d");

    /// Unsigned 32-bit integer representing an index into an out-of-band array
    /// of file descriptors.
    pub const UNIX_FD: &'static Signature = Signature::new_const(b"h");

    /// Construct a new empty signature.
    pub const fn empty() -> &'static Self {
        Self::EMPTY
    }

    /// Test if the signature is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The length of the signature in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Construct a new signature with validation inside of a constant context.
    ///
    /// This will panic in case the signature is invalid.
    ///
    /// ```compile_fail
    /// use tokio_dbus_wire::Signature;
    ///
    /// const BAD: &Signature = Signature::new_const(b"(a)");
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::Signature;
    ///
    /// const SIG: &Signature = Signature::new_const(b"i(ai)");
    /// ```
    #[inline]
    #[track_caller]
    pub const fn new_const(signature: &[u8]) -> &Signature {
        if validate(signature).is_err() {
            panic!("Invalid D-Bus signature")
        };

        // SAFETY: The byte slice is repr transparent over this type.
        unsafe { Self::new_unchecked(signature) }
    }

    /// Try to construct a new signature with validation.
    #[inline]
    pub const fn new(signature: &[u8]) -> Result<&Signature, SignatureError> {
        if let Err(error) = validate(signature) {
            return Err(error);
        };

        // SAFETY: The byte slice is repr transparent over this type.
        unsafe { Ok(Self::new_unchecked(signature)) }
    }

    /// Try to construct the element signature of an array.
    ///
    /// Unlike a free-standing signature this may be a dict entry, since the
    /// element is validated as part of the array it belongs to.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::Signature;
    ///
    /// assert!(Signature::new(b"{sv}").is_err());
    /// assert_eq!(Signature::new_array_element(b"{sv}")?, "{sv}");
    /// assert_eq!(Signature::new_array_element(b"(ii)")?, "(ii)");
    ///
    /// assert!(Signature::new_array_element(b"").is_err());
    /// assert!(Signature::new_array_element(b"uu").is_err());
    /// assert!(Signature::new_array_element(b"{vs}").is_err());
    /// # Ok::<_, tokio_dbus_wire::Error>(())
    /// ```
    pub fn new_array_element(element: &[u8]) -> Result<&Signature, SignatureError> {
        let mut array = Vec::with_capacity(element.len() + 1);
        array.push(b'a');
        array.extend_from_slice(element);

        if !Signature::new(&array)?.is_single_complete_type() {
            return Err(SignatureError::new(SignatureErrorKind::NotSingleCompleteType));
        }

        // SAFETY: The element type of a valid array is valid.
        unsafe { Ok(Signature::new_unchecked(element)) }
    }

    /// Construct a new signature without validation. The caller is responsible
    /// for ensuring that the signature is valid.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the signature is a valid signature.
    #[inline]
    pub(crate) const unsafe fn new_unchecked(signature: &[u8]) -> &Self {
        &*(signature as *const _ as *const Signature)
    }

    /// Get the signature as a string.
    pub fn as_str(&self) -> &str {
        // SAFETY: Validation ensures that the signature is ASCII.
        unsafe { from_utf8_unchecked(&self.0) }
    }

    /// Get the signature as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Iterate over the single complete types in this signature.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::Signature;
    ///
    /// let sig = Signature::new(b"ia{sv}(ii)")?;
    /// let types = sig.iter().map(|s| s.as_str()).collect::<Vec<_>>();
    /// assert_eq!(types, ["i", "a{sv}", "(ii)"]);
    /// # Ok::<_, tokio_dbus_wire::Error>(())
    /// ```
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.0)
    }

    /// Test if this signature is exactly one complete type.
    pub fn is_single_complete_type(&self) -> bool {
        let mut it = self.iter();
        it.next().is_some() && it.next().is_none()
    }

    /// The type code this signature starts with.
    #[inline]
    pub(crate) fn first(&self) -> Option<Type> {
        self.0.first().map(|&b| Type::new(b))
    }

    /// The signature with its first and last byte removed, which for a
    /// struct or dict entry are its fields.
    pub(crate) fn inner(&self) -> &Signature {
        match &self.0 {
            [_, inner @ .., _] => {
                // SAFETY: The fields of a valid container are valid.
                unsafe { Signature::new_unchecked(inner) }
            }
            _ => Signature::EMPTY,
        }
    }

    /// The signature with its first byte removed, which for an array is its
    /// element type.
    pub(crate) fn tail(&self) -> &Signature {
        match &self.0 {
            [_, tail @ ..] => {
                // SAFETY: The element type of a valid array is valid.
                unsafe { Signature::new_unchecked(tail) }
            }
            _ => Signature::EMPTY,
        }
    }
}

impl fmt::Debug for Signature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Signature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<Signature> for Signature {
    #[inline]
    fn as_ref(&self) -> &Signature {
        self
    }
}

impl ToOwned for Signature {
    type Owned = OwnedSignature;

    #[inline]
    fn to_owned(&self) -> Self::Owned {
        // SAFETY: The signature is already validated.
        unsafe { OwnedSignature::from_vec(self.0.to_vec()) }
    }
}

impl PartialEq<OwnedSignature> for Signature {
    #[inline]
    fn eq(&self, other: &OwnedSignature) -> bool {
        self.0 == *other.as_bytes()
    }
}

impl PartialEq<str> for Signature {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0 == *other.as_bytes()
    }
}
