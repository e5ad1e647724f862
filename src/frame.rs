use crate::proto::Endianness;
use crate::Signature;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A fixed-size value in the protocol.
///
/// The size of a frame is also its alignment.
pub trait Frame: Copy + self::sealed::Sealed {
    /// Size and alignment of the frame in bytes.
    #[doc(hidden)]
    const SIZE: usize;

    /// The signature of the frame.
    const SIGNATURE: &'static Signature;

    /// Decode the frame from exactly [`Frame::SIZE`] bytes.
    #[doc(hidden)]
    fn read_from(bytes: &[u8], endianness: Endianness) -> Self;

    /// Encode the frame into exactly [`Frame::SIZE`] bytes.
    #[doc(hidden)]
    fn write_to(self, bytes: &mut [u8], endianness: Endianness);
}

macro_rules! impl_number {
    ($($ty:ty, $signature:ident),* $(,)?) => {
        $(
            impl self::sealed::Sealed for $ty {}

            impl Frame for $ty {
                const SIZE: usize = ::core::mem::size_of::<$ty>();
                const SIGNATURE: &'static Signature = Signature::$signature;

                #[inline]
                fn read_from(bytes: &[u8], endianness: Endianness) -> Self {
                    let mut array = [0; ::core::mem::size_of::<$ty>()];
                    array.copy_from_slice(bytes);

                    if endianness == Endianness::BIG {
                        <$ty>::from_be_bytes(array)
                    } else {
                        <$ty>::from_le_bytes(array)
                    }
                }

                #[inline]
                fn write_to(self, bytes: &mut [u8], endianness: Endianness) {
                    let array = if endianness == Endianness::BIG {
                        self.to_be_bytes()
                    } else {
                        self.to_le_bytes()
                    };

                    bytes.copy_from_slice(&array);
                }
            }
        )*
    }
}

impl_number! {
    u8, BYTE,
    i16, INT16,
    u16, UINT16,
    i32, INT32,
    u32, UINT32,
    i64, INT64,
    u64, UINT64,
    f64, DOUBLE,
}
