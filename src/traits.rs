//! This module defines the shared trait that ties a Rust primitive to its wire
//! representation: a fixed-width, little-endian scalar.

use crate::types::TambakDataType;
use bytemuck::Pod;
use num_traits::NumCast;

/// A primitive that can be written to and read from a stream buffer.
///
/// Every implementor is `Pod`, so whole slices can be appended to a buffer with a
/// single byte copy on little-endian targets.
pub trait WireScalar: Pod + NumCast + PartialEq + std::fmt::Debug + Send + Sync {
    /// The element type this primitive is declared as in a descriptor.
    const DTYPE: TambakDataType;

    /// Appends the little-endian bytes of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Reads one value from the first `DTYPE.byte_width()` bytes of `bytes`.
    /// Callers must pass a slice of at least that length.
    fn read_le(bytes: &[u8]) -> Self;

    /// Widens the value to `f64` for scaling and range checks.
    fn to_f64(self) -> f64;
}

macro_rules! impl_wire_scalar {
    ($($t:ty => $variant:ident),+ $(,)?) => {
        $(
            impl WireScalar for $t {
                const DTYPE: TambakDataType = TambakDataType::$variant;

                #[inline]
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                    <$t>::from_le_bytes(buf)
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )+
    };
}

impl_wire_scalar!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

/// Appends a typed slice to `out` in little-endian order.
pub fn extend_le<T: WireScalar>(values: &[T], out: &mut Vec<u8>) {
    #[cfg(target_endian = "little")]
    {
        out.extend_from_slice(bytemuck::cast_slice(values));
    }
    #[cfg(not(target_endian = "little"))]
    {
        for v in values {
            (*v).write_le(out);
        }
    }
}

/// Decodes a little-endian byte slice into a typed vector.
/// `bytes.len()` must be a multiple of the element width.
pub fn read_le_vec<T: WireScalar>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(T::read_le)
        .collect()
}
