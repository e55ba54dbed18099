use crate::core::error::Result;
use crate::packed::{BackingArray, Mutable, Reader, check_index, check_value};

macro_rules! direct_array {
    ($name:ident, $ty:ty, $bits:expr, $variant:ident) => {
        /// Natively aligned array of
        #[doc = concat!(stringify!($bits), "-bit values")]
        #[derive(Debug, Clone)]
        pub struct $name {
            values: Vec<$ty>,
        }

        impl $name {
            pub const BITS_PER_VALUE: u32 = $bits;

            pub fn new(value_count: usize) -> Self {
                $name { values: vec![0; value_count] }
            }

            pub fn from_values(values: Vec<$ty>) -> Self {
                $name { values }
            }

            pub fn values(&self) -> &[$ty] {
                &self.values
            }
        }

        impl Reader for $name {
            fn get(&self, index: usize) -> u64 {
                self.values[index] as u64
            }

            fn bits_per_value(&self) -> u32 {
                $bits
            }

            fn size(&self) -> usize {
                self.values.len()
            }

            fn backing_array(&self) -> Option<BackingArray<'_>> {
                Some(BackingArray::$variant(&self.values))
            }
        }

        impl Mutable for $name {
            fn set(&mut self, index: usize, value: u64) -> Result<()> {
                check_index(self.values.len(), index)?;
                check_value($bits, value)?;
                self.values[index] = value as $ty;
                Ok(())
            }

            fn clear(&mut self) {
                self.values.iter_mut().for_each(|v| *v = 0);
            }
        }
    };
}

direct_array!(Direct8, u8, 8, U8);
direct_array!(Direct16, u16, 16, U16);
direct_array!(Direct32, u32, 32, U32);
direct_array!(Direct64, u64, 64, U64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct16_rejects_wider_values() {
        let mut array = Direct16::new(2);
        array.set(0, 0xFFFF).unwrap();
        assert!(array.set(1, 0x1_0000).is_err());
        assert_eq!(array.values(), &[0xFFFF, 0]);
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut array = Direct32::from_values(vec![1, 2, 3]);
        array.clear();
        assert_eq!(array.get(2), 0);
        assert!(matches!(array.backing_array(), Some(BackingArray::U32(&[0, 0, 0]))));
    }
}
