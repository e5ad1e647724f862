//! Validated D-Bus type signatures.

#[macro_use]
mod stack;

pub use self::iter::Iter;
mod iter;

pub use self::owned_signature::OwnedSignature;
mod owned_signature;

pub use self::signature::Signature;
mod signature;

pub use self::signature_error::SignatureError;
pub(crate) use self::signature_error::SignatureErrorKind;
mod signature_error;

use self::validation::validate;
mod validation;

#[cfg(test)]
mod tests;

/// The maximum size of a signature is 255 bytes, so anything at or above
/// this is rejected.
pub(crate) const MAX_SIGNATURE: usize = 256;

/// Maximum nesting of arrays and of structs, counted separately.
pub(crate) const MAX_CONTAINER_DEPTH: usize = 32;

/// Maximum total nesting of containers.
pub(crate) const MAX_DEPTH: usize = MAX_CONTAINER_DEPTH * 2;
