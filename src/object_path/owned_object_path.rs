use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use super::{validate, ObjectPath, ObjectPathError};

/// An owned object path.
///
/// This is the owned variant which dereferences to [`ObjectPath`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OwnedObjectPath(Vec<u8>);

impl OwnedObjectPath {
    /// Construct from a raw vector.
    ///
    /// # Safety
    ///
    /// Caller must ensure that the vector contains a valid object path.
    #[inline]
    pub(super) unsafe fn from_raw_vec(path: Vec<u8>) -> Self {
        Self(path)
    }
}

impl Deref for OwnedObjectPath {
    type Target = ObjectPath;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: Construction ensures that the path is valid.
        unsafe { ObjectPath::new_unchecked(&self.0) }
    }
}

impl Borrow<ObjectPath> for OwnedObjectPath {
    #[inline]
    fn borrow(&self) -> &ObjectPath {
        self
    }
}

impl AsRef<ObjectPath> for OwnedObjectPath {
    #[inline]
    fn as_ref(&self) -> &ObjectPath {
        self
    }
}

impl From<&ObjectPath> for OwnedObjectPath {
    #[inline]
    fn from(path: &ObjectPath) -> Self {
        path.to_owned()
    }
}

/// Parse an owned object path from a string.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::OwnedObjectPath;
///
/// let path: OwnedObjectPath = "/se/tedro".parse()?;
/// assert_eq!(path.as_str(), "/se/tedro");
/// assert!("/se/".parse::<OwnedObjectPath>().is_err());
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
impl FromStr for OwnedObjectPath {
    type Err = ObjectPathError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !validate(s.as_bytes()) {
            return Err(ObjectPathError);
        }

        Ok(Self(s.as_bytes().to_vec()))
    }
}

impl PartialEq<ObjectPath> for OwnedObjectPath {
    #[inline]
    fn eq(&self, other: &ObjectPath) -> bool {
        **self == *other
    }
}

impl PartialEq<&ObjectPath> for OwnedObjectPath {
    #[inline]
    fn eq(&self, other: &&ObjectPath) -> bool {
        **self == **other
    }
}

impl fmt::Display for OwnedObjectPath {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl fmt::Debug for OwnedObjectPath {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
