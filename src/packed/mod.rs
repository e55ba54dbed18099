//! Fixed bit-width unsigned integer arrays.
//!
//! Widths 8/16/32/64 are stored in natively aligned vectors; every other width
//! uses a single bit stream over `u64` blocks. Values wider than the array's
//! bit width are rejected by `set` with `InvalidArgument`; nothing is ever
//! silently masked.

pub mod direct;
pub mod growable;
pub mod io;
pub mod packed64;

use crate::core::error::{Error, Result};

pub use direct::{Direct16, Direct32, Direct64, Direct8};
pub use growable::GrowableWriter;
pub use io::{PackedIntsWriter, read_packed, write_packed};
pub use packed64::Packed64;

pub const CODEC_NAME: &str = "PackedInts";
pub const VERSION_START: i32 = 0;
pub const VERSION_CURRENT: i32 = VERSION_START;

/// Read access to a packed array
pub trait Reader: Send + Sync {
    fn get(&self, index: usize) -> u64;

    fn bits_per_value(&self) -> u32;

    fn size(&self) -> usize;

    /// Backing buffer for natively aligned widths
    fn backing_array(&self) -> Option<BackingArray<'_>> {
        None
    }

    fn has_array(&self) -> bool {
        self.backing_array().is_some()
    }
}

/// Direct view of a natively aligned array, for bulk I/O
#[derive(Debug, Clone, Copy)]
pub enum BackingArray<'a> {
    U8(&'a [u8]),
    U16(&'a [u16]),
    U32(&'a [u32]),
    U64(&'a [u64]),
}

pub trait Mutable: Reader {
    fn set(&mut self, index: usize, value: u64) -> Result<()>;

    fn clear(&mut self);
}

/// Largest value storable in `bits_per_value` bits
pub fn max_value(bits_per_value: u32) -> u64 {
    if bits_per_value >= 64 {
        u64::MAX
    } else {
        !(u64::MAX << bits_per_value)
    }
}

/// Round a width up to the next natively aligned width
pub fn next_fixed_size(bits_per_value: u32) -> u32 {
    match bits_per_value {
        0..=8 => 8,
        9..=16 => 16,
        17..=32 => 32,
        _ => 64,
    }
}

/// Bits needed to represent `max`; at least 1
pub fn bits_required(max: u64) -> u32 {
    (64 - max.leading_zeros()).max(1)
}

pub fn check_bits_per_value(bits_per_value: u32) -> Result<()> {
    if bits_per_value == 0 || bits_per_value > 64 {
        return Err(Error::invalid_argument(format!("bits_per_value must be in 1..=64, got {}", bits_per_value)));
    }
    Ok(())
}

pub(crate) fn check_value(bits_per_value: u32, value: u64) -> Result<()> {
    if value > max_value(bits_per_value) {
        return Err(Error::invalid_argument(format!(
            "value {} does not fit in {} bits (max {})",
            value,
            bits_per_value,
            max_value(bits_per_value)
        )));
    }
    Ok(())
}

pub(crate) fn check_index(size: usize, index: usize) -> Result<()> {
    if index >= size {
        return Err(Error::invalid_argument(format!("index {} out of bounds for {} values", index, size)));
    }
    Ok(())
}

/// Mutable array for `value_count` values of `bits_per_value` bits
pub fn get_mutable(value_count: usize, bits_per_value: u32) -> Result<Box<dyn Mutable>> {
    check_bits_per_value(bits_per_value)?;
    Ok(match bits_per_value {
        8 => Box::new(Direct8::new(value_count)),
        16 => Box::new(Direct16::new(value_count)),
        32 => Box::new(Direct32::new(value_count)),
        64 => Box::new(Direct64::new(value_count)),
        _ => Box::new(Packed64::new(value_count, bits_per_value)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    #[test]
    fn max_value_edges() {
        assert_eq!(max_value(1), 1);
        assert_eq!(max_value(7), 127);
        assert_eq!(max_value(63), i64::MAX as u64);
        assert_eq!(max_value(64), u64::MAX);
    }

    #[test]
    fn fixed_size_rounding() {
        assert_eq!(next_fixed_size(1), 8);
        assert_eq!(next_fixed_size(8), 8);
        assert_eq!(next_fixed_size(9), 16);
        assert_eq!(next_fixed_size(17), 32);
        assert_eq!(next_fixed_size(33), 64);
        assert_eq!(next_fixed_size(64), 64);
    }

    #[test]
    fn bits_required_minimum_is_one() {
        assert_eq!(bits_required(0), 1);
        assert_eq!(bits_required(1), 1);
        assert_eq!(bits_required(255), 8);
        assert_eq!(bits_required(256), 9);
        assert_eq!(bits_required(u64::MAX), 64);
    }

    #[test]
    fn every_width_round_trips_in_memory() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for bits in 1..=64u32 {
            for &count in &[0usize, 1, 17, 1000] {
                let mut array = get_mutable(count, bits).unwrap();
                assert_eq!(array.size(), count);
                assert_eq!(array.bits_per_value(), bits);
                let values: Vec<u64> = (0..count).map(|_| rng.next_u64() & max_value(bits)).collect();
                for (i, &v) in values.iter().enumerate() {
                    array.set(i, v).unwrap();
                }
                for (i, &v) in values.iter().enumerate() {
                    assert_eq!(array.get(i), v, "bits={} count={} index={}", bits, count, i);
                }
            }
        }
    }

    #[test]
    fn native_widths_expose_backing_buffer() {
        for bits in [8, 16, 32, 64] {
            assert!(get_mutable(4, bits).unwrap().has_array());
        }
        assert!(!get_mutable(4, 12).unwrap().has_array());
    }

    #[test]
    fn oversized_values_are_rejected_without_touching_neighbours() {
        for bits in [3u32, 8, 13, 16, 31, 32] {
            let mut array = get_mutable(3, bits).unwrap();
            array.set(0, max_value(bits)).unwrap();
            array.set(2, max_value(bits)).unwrap();
            assert!(array.set(1, max_value(bits) + 1).is_err());
            assert_eq!(array.get(0), max_value(bits));
            assert_eq!(array.get(1), 0);
            assert_eq!(array.get(2), max_value(bits));
        }
    }

    #[test]
    fn invalid_widths_are_rejected() {
        assert!(get_mutable(1, 0).is_err());
        assert!(get_mutable(1, 65).is_err());
    }
}
