//! Element-wise reduction primitives used by the reduce, allreduce and scan
//! collectives.

use crate::error::{MpiError, Result};
use crate::types::{DataType, ReduceOp};

/// Trait for element types that can be combined by a [`ReduceOp`].
///
/// Callers check [`ReduceOp::supports`] first; the arms for combinations that
/// check rejects still produce a value so the match stays total.
pub(crate) trait Reducible: Copy + 'static {
    fn reduce(a: Self, b: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_reducible {
    (int: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a.wrapping_add(b),
                        ReduceOp::Prod => a.wrapping_mul(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                        ReduceOp::Land => ((a != 0) && (b != 0)) as $ty,
                        ReduceOp::Lor => ((a != 0) || (b != 0)) as $ty,
                        ReduceOp::Lxor => ((a != 0) != (b != 0)) as $ty,
                        ReduceOp::Band => a & b,
                        ReduceOp::Bor => a | b,
                        ReduceOp::Bxor => a ^ b,
                    }
                }
            }
        )*
    };
    (float: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a + b,
                        ReduceOp::Prod => a * b,
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                        ReduceOp::Land => (((a != 0.0) && (b != 0.0)) as u8).into(),
                        ReduceOp::Lor => (((a != 0.0) || (b != 0.0)) as u8).into(),
                        ReduceOp::Lxor => (((a != 0.0) != (b != 0.0)) as u8).into(),
                        ReduceOp::Band => <$ty>::from_bits(a.to_bits() & b.to_bits()),
                        ReduceOp::Bor => <$ty>::from_bits(a.to_bits() | b.to_bits()),
                        ReduceOp::Bxor => <$ty>::from_bits(a.to_bits() ^ b.to_bits()),
                    }
                }
            }
        )*
    };
}

impl_reducible!(int: i8, i16, i32, i64, u8, u16, u32, u64);
impl_reducible!(float: f32, f64);

/// Fail with `UnsupportedDType` unless `op` is defined over `dtype`.
pub fn check_op(dtype: DataType, op: ReduceOp) -> Result<()> {
    if op.supports(dtype) {
        Ok(())
    } else {
        Err(MpiError::UnsupportedDType { dtype, op })
    }
}

/// Element-wise `dst[i] = op(dst[i], src[i])` on byte slices interpreted as
/// `count` little-endian `dtype` elements.
///
/// Both slices must hold at least `count * dtype.size_in_bytes()` bytes.
pub fn reduce_slice(
    dst: &mut [u8],
    src: &[u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    check_op(dtype, op)?;
    let nbytes = dtype.bytes_for(count);
    if dst.len() < nbytes || src.len() < nbytes {
        return Err(MpiError::BufferSizeMismatch {
            expected: nbytes,
            actual: dst.len().min(src.len()),
        });
    }
    let dst = &mut dst[..nbytes];
    let src = &src[..nbytes];
    match dtype {
        // Byte and Bool are one-byte lanes; `check_op` already restricted
        // them to bitwise and logical operators respectively.
        DataType::Byte | DataType::Bool | DataType::U8 => reduce_slice_typed::<u8>(dst, src, op),
        DataType::I8 => reduce_slice_typed::<i8>(dst, src, op),
        DataType::I16 => reduce_slice_typed::<i16>(dst, src, op),
        DataType::U16 => reduce_slice_typed::<u16>(dst, src, op),
        DataType::I32 => reduce_slice_typed::<i32>(dst, src, op),
        DataType::U32 => reduce_slice_typed::<u32>(dst, src, op),
        DataType::I64 => reduce_slice_typed::<i64>(dst, src, op),
        DataType::U64 => reduce_slice_typed::<u64>(dst, src, op),
        DataType::F32 => reduce_slice_typed::<f32>(dst, src, op),
        DataType::F64 => reduce_slice_typed::<f64>(dst, src, op),
    }
    Ok(())
}

/// Read and write values from little-endian byte slices (alignment-safe).
trait LeBytes: Sized {
    const SIZE: usize;
    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, bytes: &mut [u8]);
}

macro_rules! impl_le_bytes {
    ($($ty:ty),*) => {
        $(
            impl LeBytes for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Self::from_le_bytes(raw)
                }

                #[inline]
                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_le_bytes!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

fn reduce_slice_typed<T: Reducible + LeBytes>(dst: &mut [u8], src: &[u8], op: ReduceOp) {
    for (d, s) in dst.chunks_exact_mut(T::SIZE).zip(src.chunks_exact(T::SIZE)) {
        let r = T::reduce(T::read_le(d), T::read_le(s), op);
        r.write_le(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of<T: LeBytes + Copy>(vals: &[T]) -> Vec<u8> {
        let mut out = vec![0u8; vals.len() * T::SIZE];
        for (v, chunk) in vals.iter().zip(out.chunks_exact_mut(T::SIZE)) {
            v.write_le(chunk);
        }
        out
    }

    fn values_of<T: LeBytes>(bytes: &[u8]) -> Vec<T> {
        bytes.chunks_exact(T::SIZE).map(T::read_le).collect()
    }

    #[test]
    fn test_reduce_slice_sum_f32() {
        let mut dst = bytes_of(&[1.0f32, 2.0, 3.0, 4.0]);
        let src = bytes_of(&[10.0f32, 20.0, 30.0, 40.0]);
        reduce_slice(&mut dst, &src, 4, DataType::F32, ReduceOp::Sum).unwrap();
        assert_eq!(values_of::<f32>(&dst), vec![11.0, 22.0, 33.0, 44.0]);
    }

    #[test]
    fn test_reduce_slice_max_min_i64() {
        let mut dst = bytes_of(&[5i64, -3, 7]);
        let src = bytes_of(&[2i64, 9, 7]);
        reduce_slice(&mut dst, &src, 3, DataType::I64, ReduceOp::Max).unwrap();
        assert_eq!(values_of::<i64>(&dst), vec![5, 9, 7]);

        let mut dst = bytes_of(&[5i64, -3, 7]);
        reduce_slice(&mut dst, &src, 3, DataType::I64, ReduceOp::Min).unwrap();
        assert_eq!(values_of::<i64>(&dst), vec![2, -3, 7]);
    }

    #[test]
    fn test_reduce_slice_prod_wraps_integers() {
        let mut dst = bytes_of(&[200u8]);
        let src = bytes_of(&[2u8]);
        reduce_slice(&mut dst, &src, 1, DataType::U8, ReduceOp::Prod).unwrap();
        assert_eq!(dst, vec![144]);
    }

    #[test]
    fn test_logical_ops_normalise_to_zero_or_one() {
        let mut dst = bytes_of(&[4i32, 0, 3, 0]);
        let src = bytes_of(&[7i32, 5, 0, 0]);
        reduce_slice(&mut dst, &src, 4, DataType::I32, ReduceOp::Land).unwrap();
        assert_eq!(values_of::<i32>(&dst), vec![1, 0, 0, 0]);

        let mut dst = bytes_of(&[4i32, 0, 3, 0]);
        reduce_slice(&mut dst, &src, 4, DataType::I32, ReduceOp::Lxor).unwrap();
        assert_eq!(values_of::<i32>(&dst), vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_bool_lor() {
        let mut dst = vec![0u8, 1, 0];
        let src = vec![0u8, 0, 1];
        reduce_slice(&mut dst, &src, 3, DataType::Bool, ReduceOp::Lor).unwrap();
        assert_eq!(dst, vec![0, 1, 1]);
    }

    #[test]
    fn test_byte_bitwise() {
        let mut dst = vec![0b1100u8, 0xff];
        let src = vec![0b1010u8, 0x0f];
        reduce_slice(&mut dst, &src, 2, DataType::Byte, ReduceOp::Bxor).unwrap();
        assert_eq!(dst, vec![0b0110, 0xf0]);
    }

    #[test]
    fn test_rejects_undefined_combinations() {
        let mut dst = vec![0u8; 8];
        let src = vec![0u8; 8];
        for (dtype, op) in [
            (DataType::F64, ReduceOp::Band),
            (DataType::F32, ReduceOp::Lor),
            (DataType::Byte, ReduceOp::Sum),
            (DataType::Bool, ReduceOp::Max),
        ] {
            let err = reduce_slice(&mut dst, &src, 1, dtype, op).unwrap_err();
            assert!(matches!(err, MpiError::UnsupportedDType { .. }), "{dtype} {op}");
        }
        assert_eq!(dst, vec![0u8; 8]);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let mut dst = vec![0u8; 4];
        let src = vec![0u8; 8];
        let err = reduce_slice(&mut dst, &src, 2, DataType::I32, ReduceOp::Sum).unwrap_err();
        assert!(matches!(
            err,
            MpiError::BufferSizeMismatch {
                expected: 8,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_only_count_elements_are_touched() {
        let mut dst = bytes_of(&[1u16, 1, 1]);
        let src = bytes_of(&[1u16, 1, 1]);
        reduce_slice(&mut dst, &src, 2, DataType::U16, ReduceOp::Sum).unwrap();
        assert_eq!(values_of::<u16>(&dst), vec![2, 2, 1]);
    }
}
