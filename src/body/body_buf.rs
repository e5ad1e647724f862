use std::fmt;

use crate::buf::AlignedBuf;
use crate::error::{Error, ErrorKind, Result};
use crate::proto::Endianness;
use crate::{Body, OwnedSignature, Signature, Value};

use super::{Depth, Storable};

/// A buffer for constructing a message body.
///
/// The signature of the body is built up as values are stored.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::{BodyBuf, Value};
/// use tokio_dbus_wire::proto::Endianness;
///
/// let mut body = BodyBuf::with_endianness(Endianness::LITTLE);
///
/// body.store(7u8)?;
/// body.store("foo")?;
/// body.store_value(&Value::Variant(Box::new(Value::UInt32(1))))?;
///
/// assert_eq!(body.signature(), "ysv");
/// assert_eq!(
///     body.get(),
///     &[7, 0, 0, 0, 3, 0, 0, 0, b'f', b'o', b'o', 0, 1, b'u', 0, 0, 1, 0, 0, 0]
/// );
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BodyBuf {
    buf: AlignedBuf,
    signature: OwnedSignature,
}

impl BodyBuf {
    /// Construct a new empty body in native endianness.
    pub const fn new() -> Self {
        Self::with_endianness(Endianness::NATIVE)
    }

    /// Construct a new empty body with the given endianness.
    pub const fn with_endianness(endianness: Endianness) -> Self {
        Self {
            buf: AlignedBuf::with_endianness(endianness),
            signature: OwnedSignature::new(),
        }
    }

    /// The endianness of the body.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.buf.endianness()
    }

    /// The signature of the values stored so far.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The encoded bytes of the body.
    #[inline]
    pub fn get(&self) -> &[u8] {
        self.buf.get()
    }

    /// The length of the body in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Test if the body is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Clear the body and its signature.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.signature.clear();
    }

    /// Store a value in the body, extending its signature.
    ///
    /// # Errors
    ///
    /// Errors if the signature would grow too long or the value can't be
    /// represented, like a string with an interior nul byte. The body is left
    /// unmodified on errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::{BodyBuf, ObjectPath};
    ///
    /// let mut body = BodyBuf::new();
    /// body.store(ObjectPath::new(b"/org/freedesktop/DBus")?)?;
    /// body.store(42u32)?;
    ///
    /// assert_eq!(body.signature(), "ou");
    /// # Ok::<_, tokio_dbus_wire::Error>(())
    /// ```
    pub fn store<T>(&mut self, value: T) -> Result<()>
    where
        T: Storable,
    {
        let mut signature = self.signature.clone();
        signature.extend_from_signature(T::SIGNATURE)?;
        value.store_to(&mut self.buf)?;
        self.signature = signature;
        Ok(())
    }

    /// Store a dynamically typed value in the body.
    ///
    /// # Errors
    ///
    /// Errors if the value doesn't describe a valid type, if array elements
    /// don't match the element signature of their array or if variants are
    /// nested too deeply. The body is left unmodified on errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::{BodyBuf, Signature, Value};
    ///
    /// let mut body = BodyBuf::new();
    ///
    /// let bad = Value::Array(
    ///     Signature::UINT32.to_owned(),
    ///     vec![Value::UInt32(1), Value::from("two")],
    /// );
    ///
    /// assert!(body.store_value(&bad).is_err());
    /// assert!(body.is_empty());
    /// ```
    pub fn store_value(&mut self, value: &Value) -> Result<()> {
        let mut signature = self.signature.clone();
        signature.extend_from_signature(value.signature()?)?;

        let len = self.buf.len();

        if let Err(error) = marshal(&mut self.buf, value, Depth::default()) {
            self.buf.truncate(len);
            return Err(error);
        }

        self.signature = signature;
        Ok(())
    }

    /// Read the body back.
    pub fn as_body(&self) -> Body<'_> {
        Body::new(self.buf.get(), self.buf.endianness(), &self.signature)
    }

    /// Deconstruct the body into its bytes and signature.
    pub(crate) fn into_parts(self) -> (Vec<u8>, OwnedSignature) {
        (self.buf.into_vec(), self.signature)
    }
}

impl fmt::Debug for BodyBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyBuf")
            .field("signature", &self.signature)
            .field("buf", &self.buf)
            .finish()
    }
}

/// Write a dynamically typed value into the buffer.
fn marshal(buf: &mut AlignedBuf, value: &Value, depth: Depth) -> Result<()> {
    match value {
        Value::Byte(value) => buf.store(*value),
        Value::Boolean(value) => buf.store(u32::from(*value)),
        Value::Int16(value) => buf.store(*value),
        Value::UInt16(value) => buf.store(*value),
        Value::Int32(value) => buf.store(*value),
        Value::UInt32(value) => buf.store(*value),
        Value::Int64(value) => buf.store(*value),
        Value::UInt64(value) => buf.store(*value),
        Value::Double(value) => buf.store(*value),
        Value::String(value) => {
            if value.as_bytes().contains(&0) {
                return Err(Error::new(ErrorKind::InteriorNul));
            }

            buf.write::<str>(value);
        }
        Value::ObjectPath(value) => buf.write(&**value),
        Value::Signature(value) => buf.write(&**value),
        Value::UnixFd(value) => buf.store(*value),
        Value::Array(element, values) => {
            let depth = depth.array()?;
            let mut array = buf.write_array(element);
            let mut scratch = Vec::new();

            for value in values {
                scratch.clear();
                value.write_signature(&mut scratch);

                if scratch != element.as_bytes() {
                    return Err(Error::new(ErrorKind::ArrayElementMismatch));
                }

                marshal(&mut array, value, depth)?;
            }

            array.finish()?;
        }
        Value::Struct(fields) => {
            let depth = depth.structure()?;
            let buf = buf.write_struct();

            for field in fields {
                marshal(buf, field, depth)?;
            }
        }
        Value::DictEntry(key, value) => {
            let depth = depth.structure()?;
            let buf = buf.write_struct();
            marshal(buf, key, depth)?;
            marshal(buf, value, depth)?;
        }
        Value::Variant(value) => {
            let depth = depth.variant()?;
            let signature = value.signature()?;
            buf.write::<Signature>(&signature);
            marshal(buf, value, depth)?;
        }
    }

    Ok(())
}
