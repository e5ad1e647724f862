//! Types for dealing with aligned protocol buffers.

#[cfg(test)]
mod tests;

pub use self::aligned_buf::AlignedBuf;
pub(crate) use self::aligned_buf::Alloc;
mod aligned_buf;

pub use self::read_buf::ReadBuf;
mod read_buf;

pub use self::array_writer::ArrayWriter;
mod array_writer;

/// The maximum length of an array in bytes.
pub const MAX_ARRAY_LENGTH: u32 = 1u32 << 26;

/// The maximum length of a body in bytes.
pub const MAX_BODY_LENGTH: u32 = 1u32 << 27;

/// The maximum length of a whole message in bytes, including header and
/// body.
pub const MAX_MESSAGE_LENGTH: usize = 1usize << 27;
