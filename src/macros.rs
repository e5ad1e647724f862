/// Declare a transparent wrapper around a raw protocol value with a set of
/// well-known constants.
macro_rules! raw_enum {
    (
        $(#[doc = $doc:literal])*
        #[repr($repr:ty)]
        $vis:vis enum $name:ident {
            $(
                $(#[$($variant_meta:meta)*])*
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        $(#[doc = $doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        $vis struct $name(pub(crate) $repr);

        impl $name {
            $(
                $(#[$($variant_meta)*])*
                $vis const $variant: Self = Self($value);
            )*

            /// Construct from a raw value.
            #[inline]
            #[allow(unused)]
            pub const fn new(value: $repr) -> Self {
                Self(value)
            }

            /// Access the raw value.
            #[inline]
            #[allow(unused)]
            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                match *self {
                    $(Self::$variant => f.write_str(stringify!($variant)),)*
                    _ => write!(f, "INVALID({:?})", self.0),
                }
            }
        }
    }
}

/// Declare a transparent wrapper around a raw protocol bit set.
macro_rules! raw_set {
    (
        $(#[doc = $doc:literal])*
        #[repr($repr:ty)]
        $vis:vis enum $name:ident {
            $(
                $(#[$($variant_meta:meta)*])*
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        $(#[doc = $doc])*
        #[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        $vis struct $name(pub(crate) $repr);

        impl $name {
            $(
                $(#[$($variant_meta)*])*
                $vis const $variant: Self = Self($value);
            )*

            /// Construct from raw bits.
            #[inline]
            #[allow(unused)]
            pub const fn new(value: $repr) -> Self {
                Self(value)
            }

            /// Access the raw bits.
            #[inline]
            #[allow(unused)]
            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl ::core::ops::BitOr<$name> for $name {
            type Output = Self;

            #[inline]
            fn bitor(self, rhs: $name) -> Self::Output {
                Self(self.0 | rhs.0)
            }
        }

        impl ::core::ops::BitAnd<$name> for $name {
            type Output = bool;

            #[inline]
            fn bitand(self, rhs: $name) -> Self::Output {
                self.0 & rhs.0 != 0
            }
        }

        impl ::core::ops::BitXor<$name> for $name {
            type Output = Self;

            #[inline]
            fn bitxor(self, rhs: $name) -> Self::Output {
                Self(self.0 ^ rhs.0)
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                struct Raw(&'static str);

                impl ::core::fmt::Debug for Raw {
                    #[inline]
                    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                        write!(f, "{}", self.0)
                    }
                }

                struct Bits($repr);

                impl ::core::fmt::Debug for Bits {
                    #[inline]
                    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                        write!(f, "{:b}", self.0)
                    }
                }

                let mut f = f.debug_set();

                let mut this = *self;

                $(
                    if this & Self::$variant {
                        f.entry(&Raw(stringify!($variant)));
                        this = this ^ Self::$variant;
                    }
                )*

                if this.0 != 0 {
                    f.entry(&Bits(this.0));
                }

                f.finish()
            }
        }
    }
}

/// Implement [`Frame`] for a raw protocol value wrapping a number.
///
/// [`Frame`]: crate::Frame
macro_rules! raw_frame {
    ($ty:ty, $repr:ty) => {
        impl $crate::frame::sealed::Sealed for $ty {}

        impl $crate::frame::Frame for $ty {
            const SIZE: usize = <$repr as $crate::frame::Frame>::SIZE;
            const SIGNATURE: &'static $crate::Signature =
                <$repr as $crate::frame::Frame>::SIGNATURE;

            #[inline]
            fn read_from(bytes: &[u8], endianness: $crate::proto::Endianness) -> Self {
                Self(<$repr as $crate::frame::Frame>::read_from(bytes, endianness))
            }

            #[inline]
            fn write_to(self, bytes: &mut [u8], endianness: $crate::proto::Endianness) {
                <$repr as $crate::frame::Frame>::write_to(self.0, bytes, endianness)
            }
        }
    };
}

/// Implement [`Storable`] for a type which implements [`Frame`].
///
/// [`Frame`]: crate::Frame
macro_rules! storable_frame {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::body::storable::sealed::Sealed for $ty {}

            impl $crate::body::Storable for $ty {
                const SIGNATURE: &'static $crate::Signature =
                    <$ty as $crate::frame::Frame>::SIGNATURE;

                #[inline]
                fn store_to(self, buf: &mut $crate::buf::AlignedBuf) -> $crate::Result<()> {
                    buf.store(self);
                    Ok(())
                }
            }
        )*
    };
}
