use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use crate::error::Result;
use crate::Signature;

use super::{SignatureError, SignatureErrorKind};

/// A D-Bus signature.
///
/// This is the owned variant which dereferences to [`Signature`].
#[derive(Default, Clone, PartialEq, Eq, Hash)]
pub struct OwnedSignature(Vec<u8>);

impl OwnedSignature {
    /// Construct a new empty signature.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::OwnedSignature;
    ///
    /// let sig = OwnedSignature::new();
    /// assert!(sig.is_empty());
    /// ```
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Construct directly from a vector.
    ///
    /// # Safety
    ///
    /// Caller must ensure that this is a valid signature.
    pub(crate) unsafe fn from_vec(signature: Vec<u8>) -> Self {
        Self(signature)
    }

    /// Clear the current signature.
    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    /// Extend this signature with another, validating the result.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::{OwnedSignature, Signature};
    ///
    /// let mut sig = OwnedSignature::new();
    /// sig.extend_from_signature(Signature::STRING)?;
    /// sig.extend_from_signature(Signature::UINT32)?;
    /// assert_eq!(sig.as_str(), "su");
    /// # Ok::<_, tokio_dbus_wire::Error>(())
    /// ```
    pub fn extend_from_signature<S>(&mut self, other: S) -> Result<(), SignatureError>
    where
        S: AsRef<Signature>,
    {
        let other = other.as_ref().as_bytes();

        // NB: Concatenating single complete types can only ever break the
        // length limit.
        if self.0.len() + other.len() >= super::MAX_SIGNATURE {
            return Err(SignatureError::new(SignatureErrorKind::SignatureTooLong));
        }

        self.0.extend_from_slice(other);
        Ok(())
    }
}

impl fmt::Debug for OwnedSignature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedSignature")
            .field(&self.as_str())
            .finish()
    }
}

impl fmt::Display for OwnedSignature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Deref for OwnedSignature {
    type Target = Signature;

    fn deref(&self) -> &Self::Target {
        // SAFETY: Construction of OwnedSignature ensures that the signature is
        // valid.
        unsafe { Signature::new_unchecked(&self.0) }
    }
}

impl Borrow<Signature> for OwnedSignature {
    #[inline]
    fn borrow(&self) -> &Signature {
        self
    }
}

impl AsRef<Signature> for OwnedSignature {
    #[inline]
    fn as_ref(&self) -> &Signature {
        self
    }
}

impl From<&Signature> for OwnedSignature {
    #[inline]
    fn from(signature: &Signature) -> Self {
        signature.to_owned()
    }
}

/// Equality check between [`Signature`] and [`OwnedSignature`].
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::{Signature, OwnedSignature};
///
/// assert_eq!(OwnedSignature::new(), *Signature::EMPTY);
/// assert_eq!(Signature::STRING.to_owned(), *Signature::STRING);
/// ```
impl PartialEq<Signature> for OwnedSignature {
    #[inline]
    fn eq(&self, other: &Signature) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&Signature> for OwnedSignature {
    #[inline]
    fn eq(&self, other: &&Signature) -> bool {
        self.0 == other.as_bytes()
    }
}
