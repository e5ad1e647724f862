use std::fmt;

use crate::buf::{ReadBuf, MAX_ARRAY_LENGTH};
use crate::error::{Error, ErrorKind, Result};
use crate::proto::{Endianness, Type};
use crate::signature::Iter;
use crate::{Frame, ObjectPath, Read, Signature, Value};

use super::Depth;

/// A read-only view into a message body.
///
/// Values are either loaded with typed reads like [`Body::load`] and
/// [`Body::read`], or dynamically through [`Body::value`] which follows the
/// signature of the body. The two styles should not be mixed.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::{Body, Signature};
/// use tokio_dbus_wire::proto::Endianness;
///
/// let mut body = Body::new(
///     b"\x07\x00\x00\x00foo bar\x00",
///     Endianness::LITTLE,
///     Signature::STRING,
/// );
///
/// assert_eq!(body.read::<str>()?, "foo bar");
/// assert!(body.is_empty());
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Clone)]
pub struct Body<'a> {
    buf: ReadBuf<'a>,
    signature: &'a Signature,
    types: Iter<'a>,
}

impl<'a> Body<'a> {
    /// Construct a body over the given bytes.
    ///
    /// The bytes are expected to be aligned as they would be inside of a
    /// message, which is always to 8 bytes.
    pub fn new(data: &'a [u8], endianness: Endianness, signature: &'a Signature) -> Self {
        Self {
            buf: ReadBuf::new(data, endianness),
            signature,
            types: signature.iter(),
        }
    }

    /// The endianness of the body.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.buf.endianness()
    }

    /// The signature of the body.
    #[inline]
    pub fn signature(&self) -> &'a Signature {
        self.signature
    }

    /// The number of bytes remaining.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Test if there are no more bytes to read.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Get the remaining bytes of the body.
    #[inline]
    pub fn get(&self) -> &'a [u8] {
        self.buf.get()
    }

    /// Load a [`Frame`] from the body.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::{BodyBuf, Signature};
    ///
    /// let mut buf = BodyBuf::new();
    /// buf.store(1u8)?;
    /// buf.store(42u32)?;
    ///
    /// let mut body = buf.as_body();
    /// assert_eq!(body.load::<u8>()?, 1);
    /// assert_eq!(body.load::<u32>()?, 42);
    /// # Ok::<_, tokio_dbus_wire::Error>(())
    /// ```
    #[inline]
    pub fn load<T>(&mut self) -> Result<T>
    where
        T: Frame,
    {
        self.buf.load()
    }

    /// Read an unsized value from the body, like a string.
    #[inline]
    pub fn read<T>(&mut self) -> Result<&'a T>
    where
        T: ?Sized + Read,
    {
        self.buf.read()
    }

    /// Load a boolean, which must be encoded as either 0 or 1.
    pub fn load_bool(&mut self) -> Result<bool> {
        match self.buf.load::<u32>()? {
            0 => Ok(false),
            1 => Ok(true),
            n => Err(Error::new(ErrorKind::InvalidBoolean(n))),
        }
    }

    /// Read the next value following the signature of the body.
    ///
    /// Returns `None` once the signature has been exhausted.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_dbus_wire::{BodyBuf, Value};
    ///
    /// let mut buf = BodyBuf::new();
    /// buf.store("hello")?;
    /// buf.store(true)?;
    ///
    /// let mut body = buf.as_body();
    /// assert_eq!(body.value()?, Some(Value::from("hello")));
    /// assert_eq!(body.value()?, Some(Value::Boolean(true)));
    /// assert_eq!(body.value()?, None);
    /// # Ok::<_, tokio_dbus_wire::Error>(())
    /// ```
    pub fn value(&mut self) -> Result<Option<Value>> {
        let Some(signature) = self.types.next() else {
            return Ok(None);
        };

        Ok(Some(demarshal(&mut self.buf, signature, Depth::default())?))
    }

    /// Read all remaining values following the signature of the body.
    ///
    /// # Errors
    ///
    /// Errors if any value is malformed, or if there are bytes left over once
    /// the signature has been exhausted.
    pub fn values(&mut self) -> Result<Vec<Value>> {
        let mut values = Vec::new();

        while let Some(value) = self.value()? {
            values.push(value);
        }

        if !self.buf.is_empty() {
            return Err(Error::new(ErrorKind::TrailingBody(self.buf.len())));
        }

        Ok(values)
    }
}

impl fmt::Debug for Body<'_> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("signature", &self.signature)
            .field("buf", &self.buf)
            .finish()
    }
}

/// Read a single complete type described by `signature`.
pub(crate) fn demarshal(
    buf: &mut ReadBuf<'_>,
    signature: &Signature,
    depth: Depth,
) -> Result<Value> {
    let Some(ty) = signature.first() else {
        return Err(Error::new(ErrorKind::InvalidVariantSignature));
    };

    let value = match ty {
        Type::BYTE => Value::Byte(buf.load()?),
        Type::BOOLEAN => match buf.load::<u32>()? {
            0 => Value::Boolean(false),
            1 => Value::Boolean(true),
            n => return Err(Error::new(ErrorKind::InvalidBoolean(n))),
        },
        Type::INT16 => Value::Int16(buf.load()?),
        Type::UINT16 => Value::UInt16(buf.load()?),
        Type::INT32 => Value::Int32(buf.load()?),
        Type::UINT32 => Value::UInt32(buf.load()?),
        Type::INT64 => Value::Int64(buf.load()?),
        Type::UINT64 => Value::UInt64(buf.load()?),
        Type::DOUBLE => Value::Double(buf.load()?),
        Type::UNIX_FD => Value::UnixFd(buf.load()?),
        Type::STRING => Value::String(buf.read::<str>()?.into()),
        Type::OBJECT_PATH => Value::ObjectPath(buf.read::<ObjectPath>()?.to_owned()),
        Type::SIGNATURE => Value::Signature(buf.read::<Signature>()?.to_owned()),
        Type::VARIANT => {
            let inner = buf.read::<Signature>()?;

            if !inner.is_single_complete_type() {
                return Err(Error::new(ErrorKind::InvalidVariantSignature));
            }

            let depth = depth.variant()?;
            Value::Variant(Box::new(demarshal(buf, inner, depth)?))
        }
        Type::ARRAY => {
            let len = buf.load::<u32>()?;

            if len > MAX_ARRAY_LENGTH {
                return Err(Error::new(ErrorKind::ArrayTooLong(len)));
            }

            let depth = depth.array()?;
            let element = signature.tail();
            buf.align(element.first().map_or(1, |ty| ty.alignment()))?;

            let mut array = buf.read_until(len as usize)?;
            let mut values = Vec::new();

            while !array.is_empty() {
                values.push(demarshal(&mut array, element, depth)?);
            }

            Value::Array(element.to_owned(), values)
        }
        Type::OPEN_PAREN => {
            let depth = depth.structure()?;
            buf.align(8)?;

            let fields = signature
                .inner()
                .iter()
                .map(|field| demarshal(buf, field, depth))
                .collect::<Result<Vec<_>>>()?;

            Value::Struct(fields)
        }
        Type::OPEN_BRACE => {
            let depth = depth.structure()?;
            buf.align(8)?;

            let mut it = signature.inner().iter();

            let (Some(key), Some(value)) = (it.next(), it.next()) else {
                return Err(Error::new(ErrorKind::InvalidVariantSignature));
            };

            let key = demarshal(buf, key, depth)?;
            let value = demarshal(buf, value, depth)?;
            Value::DictEntry(Box::new(key), Box::new(value))
        }
        _ => return Err(Error::new(ErrorKind::InvalidVariantSignature)),
    };

    Ok(value)
}
