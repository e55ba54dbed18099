use crate::core::error::Result;
use crate::store::data_input::IndexInput;
use crate::store::data_output::IndexOutput;

/// Marker written in place of the size for the d-gaps encoding
const DGAPS_MARKER: i32 = -1;

/// Fixed-size bit set used for deleted documents.
///
/// Written either dense (`int size`, `int count`, raw bytes) or, when few
/// bits are set, as d-gaps (`int -1`, `int size`, `int count`, then
/// `vint gap` + byte for every non-zero byte).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitVector {
    bits: Vec<u8>,
    size: usize,
    count: usize,
}

impl BitVector {
    pub fn new(size: usize) -> Self {
        BitVector {
            bits: vec![0u8; size.div_ceil(8)],
            size,
            count: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of set bits
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn get(&self, bit: usize) -> bool {
        bit < self.size && self.bits[bit >> 3] & (1 << (bit & 7)) != 0
    }

    /// Set `bit`; returns whether it was clear before
    pub fn set(&mut self, bit: usize) -> bool {
        if bit >= self.size || self.get(bit) {
            return false;
        }
        self.bits[bit >> 3] |= 1 << (bit & 7);
        self.count += 1;
        true
    }

    pub fn clear(&mut self, bit: usize) -> bool {
        if !self.get(bit) {
            return false;
        }
        self.bits[bit >> 3] &= !(1 << (bit & 7));
        self.count -= 1;
        true
    }

    fn is_sparse(&self) -> bool {
        // estimated d-gaps size: one byte per set bit plus a gap vint
        let non_zero = self.bits.iter().filter(|&&b| b != 0).count();
        let gap_bytes = non_zero * 2 + 12;
        gap_bytes < self.bits.len() + 8
    }

    pub fn write(&self, out: &mut IndexOutput) {
        if self.is_sparse() {
            out.write_int(DGAPS_MARKER);
            out.write_int(self.size as i32);
            out.write_int(self.count as i32);
            let mut last = 0usize;
            for (i, &b) in self.bits.iter().enumerate() {
                if b != 0 {
                    out.write_vint((i - last) as u32);
                    out.write_byte(b);
                    last = i;
                }
            }
        } else {
            out.write_int(self.size as i32);
            out.write_int(self.count as i32);
            out.write_bytes(&self.bits);
        }
    }

    pub fn read(input: &mut IndexInput) -> Result<Self> {
        let first = input.read_int()?;
        let sparse = first == DGAPS_MARKER;
        let size = if sparse { input.read_int()? } else { first };
        if size < 0 {
            return Err(input.corrupt(format!("invalid bit vector size {}", size)));
        }
        let size = size as usize;
        let count = input.read_int()?;
        let mut bits = vec![0u8; size.div_ceil(8)];

        if sparse {
            let mut last = 0usize;
            let mut seen = 0usize;
            while seen < count.max(0) as usize {
                last += input.read_vint()? as usize;
                if last >= bits.len() {
                    return Err(input.corrupt(format!("d-gap byte {} out of range {}", last, bits.len())));
                }
                bits[last] = input.read_byte()?;
                seen += bits[last].count_ones() as usize;
            }
        } else {
            let raw = input.read_bytes(bits.len())?;
            bits.copy_from_slice(raw);
        }

        let actual: usize = bits.iter().map(|b| b.count_ones() as usize).sum();
        if count < 0 || actual != count as usize {
            return Err(input.corrupt(format!("bit count mismatch: header={} actual={}", count, actual)));
        }
        Ok(BitVector { bits, size, count: actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn reread(bv: &BitVector) -> BitVector {
        let mut out = IndexOutput::new("_0.del");
        bv.write(&mut out);
        let mut input = IndexInput::new("_0.del", Bytes::from(out.into_bytes()));
        let read = BitVector::read(&mut input).unwrap();
        assert_eq!(input.remaining(), 0);
        read
    }

    #[test]
    fn set_and_clear_track_count() {
        let mut bv = BitVector::new(10);
        assert!(bv.set(3));
        assert!(!bv.set(3));
        assert!(bv.set(9));
        assert!(!bv.set(10));
        assert_eq!(bv.count(), 2);
        assert!(bv.clear(3));
        assert!(!bv.get(3));
        assert_eq!(bv.count(), 1);
    }

    #[test]
    fn sparse_vector_uses_dgaps() {
        let mut bv = BitVector::new(100_000);
        bv.set(5);
        bv.set(77_777);
        let mut out = IndexOutput::new("d");
        bv.write(&mut out);
        assert!(out.position() < 30);
        assert_eq!(reread(&bv), bv);
    }

    #[test]
    fn dense_vector_reads_back() {
        let mut bv = BitVector::new(1001);
        for i in (0..1001).step_by(2) {
            bv.set(i);
        }
        let read = reread(&bv);
        assert_eq!(read.count(), 501);
        assert!(read.get(1000));
        assert!(!read.get(999));
    }

    #[test]
    fn wrong_count_is_corruption() {
        let mut out = IndexOutput::new("d");
        out.write_int(16);
        out.write_int(3);
        out.write_bytes(&[0b1, 0]);
        let mut input = IndexInput::new("d", Bytes::from(out.into_bytes()));
        assert!(BitVector::read(&mut input).unwrap_err().is_corruption());
    }
}
