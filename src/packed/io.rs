use crate::core::error::{Error, Result};
use crate::packed::{
    CODEC_NAME, Direct16, Direct32, Direct64, Direct8, Packed64, Reader, VERSION_CURRENT, VERSION_START,
    check_bits_per_value, check_value,
};
use crate::store::codec_util;
use crate::store::data_input::IndexInput;
use crate::store::data_output::IndexOutput;

/// Streams values into the on-disk packed layout:
/// header, vint bits per value, vint value count, then the bit stream as
/// big-endian longs (the last one zero padded).
pub struct PackedIntsWriter<'a> {
    out: &'a mut IndexOutput,
    bits_per_value: u32,
    value_count: usize,
    written: usize,
    pending: u64,
    pending_bits: u32,
}

impl<'a> PackedIntsWriter<'a> {
    pub fn new(out: &'a mut IndexOutput, value_count: usize, bits_per_value: u32) -> Result<Self> {
        check_bits_per_value(bits_per_value)?;
        codec_util::write_header(out, CODEC_NAME, VERSION_CURRENT);
        out.write_vint(bits_per_value);
        out.write_vint(value_count as u32);
        Ok(PackedIntsWriter {
            out,
            bits_per_value,
            value_count,
            written: 0,
            pending: 0,
            pending_bits: 0,
        })
    }

    pub fn add(&mut self, value: u64) -> Result<()> {
        check_value(self.bits_per_value, value)?;
        if self.written == self.value_count {
            return Err(Error::invalid_state(format!("all {} values already written", self.value_count)));
        }
        let bits = self.bits_per_value;
        let free = 64 - self.pending_bits;
        if bits <= free {
            self.pending |= value << (free - bits);
            self.pending_bits += bits;
        } else {
            let spill = bits - free;
            self.pending |= value >> spill;
            self.flush_block();
            self.pending = value << (64 - spill);
            self.pending_bits = spill;
        }
        if self.pending_bits == 64 {
            self.flush_block();
        }
        self.written += 1;
        Ok(())
    }

    fn flush_block(&mut self) {
        self.out.write_long(self.pending as i64);
        self.pending = 0;
        self.pending_bits = 0;
    }

    pub fn finish(mut self) -> Result<()> {
        if self.written != self.value_count {
            return Err(Error::invalid_state(format!(
                "expected {} values, got {}",
                self.value_count, self.written
            )));
        }
        if self.pending_bits > 0 {
            self.flush_block();
        }
        Ok(())
    }
}

/// Write a whole reader in the packed layout
pub fn write_packed<R: Reader + ?Sized>(out: &mut IndexOutput, reader: &R) -> Result<()> {
    let mut writer = PackedIntsWriter::new(out, reader.size(), reader.bits_per_value())?;
    for i in 0..reader.size() {
        writer.add(reader.get(i))?;
    }
    writer.finish()
}

/// Read an array written by `PackedIntsWriter`, picking the natively aligned
/// representation when the width allows it
pub fn read_packed(input: &mut IndexInput) -> Result<Box<dyn Reader>> {
    codec_util::check_header(input, CODEC_NAME, VERSION_START, VERSION_CURRENT)?;
    let bits_per_value = input.read_vint()?;
    if bits_per_value == 0 || bits_per_value > 64 {
        return Err(input.corrupt(format!("invalid bits per value {}", bits_per_value)));
    }
    let value_count = input.read_vint()? as usize;

    let block_count = Packed64::block_count(value_count, bits_per_value);
    if (block_count as u64) * 8 > input.remaining() {
        return Err(input.corrupt(format!("{} packed blocks exceed file length", block_count)));
    }
    let mut blocks = Vec::with_capacity(block_count);
    for _ in 0..block_count {
        blocks.push(input.read_long()? as u64);
    }
    let packed = Packed64::from_blocks(blocks, value_count, bits_per_value)?;

    Ok(match bits_per_value {
        8 => Box::new(Direct8::from_values((0..value_count).map(|i| packed.get(i) as u8).collect())),
        16 => Box::new(Direct16::from_values((0..value_count).map(|i| packed.get(i) as u16).collect())),
        32 => Box::new(Direct32::from_values((0..value_count).map(|i| packed.get(i) as u32).collect())),
        64 => Box::new(Direct64::from_values((0..value_count).map(|i| packed.get(i)).collect())),
        _ => Box::new(packed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::packed::{get_mutable, max_value};
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn round_trip(bits: u32, values: &[u64]) -> Box<dyn Reader> {
        let mut out = IndexOutput::new("packed");
        let mut writer = PackedIntsWriter::new(&mut out, values.len(), bits).unwrap();
        for &v in values {
            writer.add(v).unwrap();
        }
        writer.finish().unwrap();
        let mut input = IndexInput::new("packed", Bytes::from(out.into_bytes()));
        let reader = read_packed(&mut input).unwrap();
        assert_eq!(input.remaining(), 0);
        reader
    }

    #[test]
    fn every_width_and_count_reads_back() {
        let mut rng = StdRng::seed_from_u64(42);
        for bits in 1..=64u32 {
            for &count in &[0usize, 1, 17, 1000] {
                let values: Vec<u64> = (0..count).map(|_| rng.next_u64() & max_value(bits)).collect();
                let reader = round_trip(bits, &values);
                assert_eq!(reader.size(), count);
                assert_eq!(reader.bits_per_value(), bits);
                for (i, &v) in values.iter().enumerate() {
                    assert_eq!(reader.get(i), v, "bits={} count={} index={}", bits, count, i);
                }
            }
        }
    }

    #[test]
    fn native_widths_come_back_direct() {
        let reader = round_trip(16, &[1, 65535, 3]);
        assert!(reader.has_array());
        let reader = round_trip(9, &[1, 511, 3]);
        assert!(!reader.has_array());
    }

    #[test]
    fn write_packed_from_mutable() {
        let mut array = get_mutable(3, 5).unwrap();
        array.set(0, 31).unwrap();
        array.set(2, 17).unwrap();
        let mut out = IndexOutput::new("p");
        write_packed(&mut out, array.as_ref()).unwrap();
        let mut input = IndexInput::new("p", Bytes::from(out.into_bytes()));
        let reader = read_packed(&mut input).unwrap();
        assert_eq!((reader.get(0), reader.get(1), reader.get(2)), (31, 0, 17));
    }

    #[test]
    fn truncated_payload_is_corruption() {
        let mut out = IndexOutput::new("p");
        let mut writer = PackedIntsWriter::new(&mut out, 100, 7).unwrap();
        for i in 0..100 {
            writer.add(i).unwrap();
        }
        writer.finish().unwrap();
        let mut bytes = out.into_bytes();
        bytes.truncate(bytes.len() - 8);
        let mut input = IndexInput::new("p", Bytes::from(bytes));
        assert!(read_packed(&mut input).err().unwrap().is_corruption());
    }
}
