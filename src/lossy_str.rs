use std::fmt;
use std::str::from_utf8;

/// Helper to debug print a byte string which is mostly valid UTF-8.
#[repr(transparent)]
pub(crate) struct LossyStr([u8]);

impl LossyStr {
    #[inline]
    pub(crate) fn new(bytes: &[u8]) -> &LossyStr {
        // SAFETY: The byte slice is repr transparent over this type.
        unsafe { &*(bytes as *const _ as *const LossyStr) }
    }
}

impl fmt::Debug for LossyStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match from_utf8(&self.0) {
            Ok(string) => string.fmt(f),
            Err(..) => write!(f, "{:?}", String::from_utf8_lossy(&self.0)),
        }
    }
}
