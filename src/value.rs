//! A dynamically typed D-Bus value.

use crate::error::Result;
use crate::{ObjectPath, OwnedObjectPath, OwnedSignature, Signature};

/// A dynamically typed value which can be stored in or loaded from a
/// message body.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::{Signature, Value};
///
/// let value = Value::Array(
///     Signature::new_array_element(b"{sv}")?.to_owned(),
///     vec![Value::DictEntry(
///         Box::new(Value::from("key")),
///         Box::new(Value::Variant(Box::new(Value::UInt32(42)))),
///     )],
/// );
///
/// assert_eq!(value.signature()?.as_str(), "a{sv}");
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An unsigned byte.
    Byte(u8),
    /// A boolean.
    Boolean(bool),
    /// A signed 16-bit integer.
    Int16(i16),
    /// An unsigned 16-bit integer.
    UInt16(u16),
    /// A signed 32-bit integer.
    Int32(i32),
    /// An unsigned 32-bit integer.
    UInt32(u32),
    /// A signed 64-bit integer.
    Int64(i64),
    /// An unsigned 64-bit integer.
    UInt64(u64),
    /// A double precision float.
    Double(f64),
    /// A string.
    String(Box<str>),
    /// An object path.
    ObjectPath(OwnedObjectPath),
    /// A signature.
    Signature(OwnedSignature),
    /// An index into the out-of-band array of file descriptors.
    UnixFd(u32),
    /// An array with the given element signature.
    ///
    /// Element signatures of dicts are constructed with
    /// [`Signature::new_array_element`].
    Array(OwnedSignature, Vec<Value>),
    /// A struct with its fields.
    Struct(Vec<Value>),
    /// A dict entry, which is only valid directly inside of an array.
    DictEntry(Box<Value>, Box<Value>),
    /// A variant.
    Variant(Box<Value>),
}

impl Value {
    /// Compute the signature of the value.
    ///
    /// # Errors
    ///
    /// Errors if the value describes a type which is not valid, such as an
    /// empty struct.
    pub fn signature(&self) -> Result<OwnedSignature> {
        let mut bytes = Vec::new();
        self.write_signature(&mut bytes);
        let signature = Signature::new(&bytes)?;
        Ok(signature.to_owned())
    }

    pub(crate) fn write_signature(&self, out: &mut Vec<u8>) {
        match self {
            Value::Byte(..) => out.push(b'y'),
            Value::Boolean(..) => out.push(b'b'),
            Value::Int16(..) => out.push(b'n'),
            Value::UInt16(..) => out.push(b'q'),
            Value::Int32(..) => out.push(b'i'),
            Value::UInt32(..) => out.push(b'u'),
            Value::Int64(..) => out.push(b'x'),
            Value::UInt64(..) => out.push(b't'),
            Value::Double(..) => out.push(b'd'),
            Value::String(..) => out.push(b's'),
            Value::ObjectPath(..) => out.push(b'o'),
            Value::Signature(..) => out.push(b'g'),
            Value::UnixFd(..) => out.push(b'h'),
            Value::Array(element, _) => {
                out.push(b'a');
                out.extend_from_slice(element.as_bytes());
            }
            Value::Struct(fields) => {
                out.push(b'(');

                for field in fields {
                    field.write_signature(out);
                }

                out.push(b')');
            }
            Value::DictEntry(key, value) => {
                out.push(b'{');
                key.write_signature(out);
                value.write_signature(out);
                out.push(b'}');
            }
            Value::Variant(..) => out.push(b'v'),
        }
    }

    /// Access the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(string) => Some(string),
            _ => None,
        }
    }

    /// Access the value as an object path, if it is one.
    pub fn as_object_path(&self) -> Option<&ObjectPath> {
        match self {
            Value::ObjectPath(path) => Some(path),
            _ => None,
        }
    }

    /// Access the value as an unsigned 32-bit integer, if it is one.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::UInt32(value) => Some(value),
            _ => None,
        }
    }

    /// Access the value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(value) => Some(value),
            _ => None,
        }
    }

    /// Access the elements of an array value.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(_, values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    #[inline]
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl From<u32> for Value {
    #[inline]
    fn from(value: u32) -> Self {
        Value::UInt32(value)
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&ObjectPath> for Value {
    #[inline]
    fn from(value: &ObjectPath) -> Self {
        Value::ObjectPath(value.to_owned())
    }
}
