//! Typed access to message bodies.

#[cfg(test)]
mod tests;

pub use self::storable::Storable;
pub(crate) mod storable;

pub use self::body_buf::BodyBuf;
mod body_buf;

pub use self::body::Body;
pub(crate) use self::body::demarshal;
#[allow(clippy::module_inception)]
mod body;

use crate::error::{Error, ErrorKind, Result};
use crate::signature::{MAX_CONTAINER_DEPTH, MAX_DEPTH};

/// The maximum number of variants which may be nested inside of each other.
pub const MAX_VARIANT_DEPTH: usize = 64;

/// Container nesting of a value, counted across variants.
///
/// Arrays and structs may each nest 32 deep, and no more than 64 containers
/// of any kind, variants included, may be nested in total.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Depth {
    arrays: usize,
    structs: usize,
    variants: usize,
}

impl Depth {
    /// Enter an array.
    pub(crate) fn array(self) -> Result<Self> {
        let depth = Self {
            arrays: self.arrays + 1,
            ..self
        };

        depth.check(depth.arrays > MAX_CONTAINER_DEPTH)
    }

    /// Enter a struct or a dict entry.
    pub(crate) fn structure(self) -> Result<Self> {
        let depth = Self {
            structs: self.structs + 1,
            ..self
        };

        depth.check(depth.structs > MAX_CONTAINER_DEPTH)
    }

    /// Enter a variant.
    pub(crate) fn variant(self) -> Result<Self> {
        if self.variants >= MAX_VARIANT_DEPTH {
            return Err(Error::new(ErrorKind::ExceededVariantDepth));
        }

        let depth = Self {
            variants: self.variants + 1,
            ..self
        };

        depth.check(false)
    }

    fn check(self, exceeded: bool) -> Result<Self> {
        if exceeded || self.arrays + self.structs + self.variants > MAX_DEPTH {
            return Err(Error::new(ErrorKind::ExceededNestingDepth));
        }

        Ok(self)
    }
}
