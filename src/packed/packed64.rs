use crate::core::error::{Error, Result};
use crate::packed::{Mutable, Reader, check_bits_per_value, check_index, check_value, max_value};

/// Generic bit packer: values are laid out back to back in one big-endian
/// bit stream over `u64` blocks, so a value may straddle two blocks.
#[derive(Debug, Clone)]
pub struct Packed64 {
    blocks: Vec<u64>,
    value_count: usize,
    bits_per_value: u32,
    mask: u64,
}

impl Packed64 {
    pub fn new(value_count: usize, bits_per_value: u32) -> Result<Self> {
        check_bits_per_value(bits_per_value)?;
        let blocks = vec![0u64; Self::block_count(value_count, bits_per_value)];
        Ok(Packed64 {
            blocks,
            value_count,
            bits_per_value,
            mask: max_value(bits_per_value),
        })
    }

    /// Wrap blocks read from disk
    pub fn from_blocks(blocks: Vec<u64>, value_count: usize, bits_per_value: u32) -> Result<Self> {
        check_bits_per_value(bits_per_value)?;
        let needed = Self::block_count(value_count, bits_per_value);
        if blocks.len() < needed {
            return Err(Error::invalid_argument(format!(
                "{} blocks cannot hold {} values of {} bits",
                blocks.len(),
                value_count,
                bits_per_value
            )));
        }
        Ok(Packed64 {
            blocks,
            value_count,
            bits_per_value,
            mask: max_value(bits_per_value),
        })
    }

    pub fn block_count(value_count: usize, bits_per_value: u32) -> usize {
        let bits = value_count as u64 * bits_per_value as u64;
        bits.div_ceil(64) as usize
    }

    pub fn blocks(&self) -> &[u64] {
        &self.blocks
    }
}

impl Reader for Packed64 {
    fn get(&self, index: usize) -> u64 {
        let bit = index as u64 * self.bits_per_value as u64;
        let block = (bit / 64) as usize;
        let end = (bit % 64) as u32 + self.bits_per_value;
        if end <= 64 {
            (self.blocks[block] >> (64 - end)) & self.mask
        } else {
            let over = end - 64;
            ((self.blocks[block] << over) | (self.blocks[block + 1] >> (64 - over))) & self.mask
        }
    }

    fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    fn size(&self) -> usize {
        self.value_count
    }
}

impl Mutable for Packed64 {
    fn set(&mut self, index: usize, value: u64) -> Result<()> {
        check_index(self.value_count, index)?;
        check_value(self.bits_per_value, value)?;

        let bit = index as u64 * self.bits_per_value as u64;
        let block = (bit / 64) as usize;
        let end = (bit % 64) as u32 + self.bits_per_value;
        if end <= 64 {
            let shift = 64 - end;
            self.blocks[block] = (self.blocks[block] & !(self.mask << shift)) | (value << shift);
        } else {
            let over = end - 64;
            self.blocks[block] = (self.blocks[block] & !(self.mask >> over)) | (value >> over);
            let shift = 64 - over;
            self.blocks[block + 1] = (self.blocks[block + 1] & (u64::MAX >> over)) | (value << shift);
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.blocks.iter_mut().for_each(|b| *b = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_straddle_block_boundaries() {
        // 21 bits: value 3 spans bits 63..84
        let mut packed = Packed64::new(10, 21).unwrap();
        for i in 0..10 {
            packed.set(i, (i as u64 * 0x2_3456) & max_value(21)).unwrap();
        }
        for i in 0..10 {
            assert_eq!(packed.get(i), (i as u64 * 0x2_3456) & max_value(21));
        }
        assert_eq!(packed.blocks().len(), 4);
    }

    #[test]
    fn overwriting_keeps_neighbours() {
        let mut packed = Packed64::new(5, 13).unwrap();
        for i in 0..5 {
            packed.set(i, max_value(13)).unwrap();
        }
        packed.set(2, 0).unwrap();
        assert_eq!(packed.get(1), max_value(13));
        assert_eq!(packed.get(2), 0);
        assert_eq!(packed.get(3), max_value(13));
    }

    #[test]
    fn too_few_blocks_is_an_error() {
        assert!(Packed64::from_blocks(vec![0], 10, 7).is_err());
        assert!(Packed64::from_blocks(vec![0, 0], 10, 7).is_ok());
    }
}
