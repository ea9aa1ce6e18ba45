//! Fixed-width primitives that can be read out of target memory.

use super::Endianness;

mod sealed
{
    pub trait Sealed {}
}

/// A fixed-width primitive as laid out by the target's C compiler
///
/// Natural alignment equals [`StructField::SIZE`]. The trait is sealed: the
/// cursor's alignment rules only hold for plain scalar types.
pub trait StructField: sealed::Sealed + Copy
{
    /// Size (and natural alignment) in bytes
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes in the given byte order
    fn from_bytes(bytes: &[u8], endianness: Endianness) -> Self;

    /// Encode into `SIZE` bytes in the given byte order
    fn to_bytes(self, endianness: Endianness) -> Vec<u8>;
}

macro_rules! impl_struct_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl StructField for $ty
            {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_bytes(bytes: &[u8], endianness: Endianness) -> Self
                {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    match endianness {
                        Endianness::Little => <$ty>::from_le_bytes(raw),
                        Endianness::Big => <$ty>::from_be_bytes(raw),
                    }
                }

                fn to_bytes(self, endianness: Endianness) -> Vec<u8>
                {
                    match endianness {
                        Endianness::Little => self.to_le_bytes().to_vec(),
                        Endianness::Big => self.to_be_bytes().to_vec(),
                    }
                }
            }
        )*
    };
}

impl_struct_field!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);
