use crate::core::error::Result;
use crate::packed::{Mutable, Reader, bits_required, get_mutable, next_fixed_size};

/// Packed array whose bit width grows on demand as larger values arrive.
///
/// With `round_fixed_size` every width is rounded up to 8/16/32/64 so the
/// array always sits on a natively aligned representation.
pub struct GrowableWriter {
    current: Box<dyn Mutable>,
    current_max: u64,
    round_fixed_size: bool,
}

impl GrowableWriter {
    pub fn new(start_bits: u32, value_count: usize, round_fixed_size: bool) -> Result<Self> {
        let bits = Self::bits_for(start_bits, round_fixed_size);
        let current = get_mutable(value_count, bits)?;
        let current_max = crate::packed::max_value(bits);
        Ok(GrowableWriter { current, current_max, round_fixed_size })
    }

    fn bits_for(bits: u32, round_fixed_size: bool) -> u32 {
        if round_fixed_size { next_fixed_size(bits) } else { bits }
    }

    pub fn get(&self, index: usize) -> u64 {
        self.current.get(index)
    }

    pub fn size(&self) -> usize {
        self.current.size()
    }

    pub fn bits_per_value(&self) -> u32 {
        self.current.bits_per_value()
    }

    pub fn set(&mut self, index: usize, value: u64) -> Result<()> {
        if value > self.current_max {
            self.grow(bits_required(value))?;
        }
        self.current.set(index, value)
    }

    fn grow(&mut self, bits: u32) -> Result<()> {
        let bits = Self::bits_for(bits, self.round_fixed_size);
        let size = self.current.size();
        let mut next = get_mutable(size, bits)?;
        for i in 0..size {
            next.set(i, self.current.get(i))?;
        }
        self.current = next;
        self.current_max = crate::packed::max_value(bits);
        Ok(())
    }

    /// The populated array at its current width
    pub fn into_mutable(self) -> Box<dyn Mutable> {
        self.current
    }

    /// Compact copy sized for the largest value actually stored, rounded to
    /// the next natively aligned width
    pub fn freeze(&self) -> Result<Box<dyn Mutable>> {
        let size = self.current.size();
        let max = (0..size).map(|i| self.current.get(i)).max().unwrap_or(0);
        let bits = next_fixed_size(bits_required(max));
        let mut frozen = get_mutable(size, bits)?;
        for i in 0..size {
            frozen.set(i, self.current.get(i))?;
        }
        Ok(frozen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_and_keeps_earlier_values() {
        let mut writer = GrowableWriter::new(4, 5, false).unwrap();
        writer.set(0, 3).unwrap();
        writer.set(1, 15).unwrap();
        assert_eq!(writer.bits_per_value(), 4);
        writer.set(2, 1 << 20).unwrap();
        assert_eq!(writer.bits_per_value(), 21);
        writer.set(3, u64::MAX).unwrap();
        assert_eq!(writer.bits_per_value(), 64);
        assert_eq!(writer.get(0), 3);
        assert_eq!(writer.get(1), 15);
        assert_eq!(writer.get(2), 1 << 20);
        assert_eq!(writer.get(3), u64::MAX);
    }

    #[test]
    fn rounding_keeps_native_widths() {
        let mut writer = GrowableWriter::new(4, 3, true).unwrap();
        assert_eq!(writer.bits_per_value(), 8);
        writer.set(0, 300).unwrap();
        assert_eq!(writer.bits_per_value(), 16);
    }

    #[test]
    fn freeze_picks_compact_native_width() {
        let mut writer = GrowableWriter::new(4, 3, false).unwrap();
        writer.set(0, 1000).unwrap();
        writer.set(1, 7).unwrap();
        let frozen = writer.freeze().unwrap();
        assert_eq!(frozen.bits_per_value(), 16);
        assert!(frozen.has_array());
        assert_eq!(frozen.get(0), 1000);
        assert_eq!(frozen.get(1), 7);
    }
}
