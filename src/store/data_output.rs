use crc32fast::Hasher;
use crate::core::error::Result;
use crate::store::directory::Directory;

/// Buffered output for one index file.
///
/// Bytes accumulate in memory; `finish` hands the complete image to the
/// directory, which writes and fsyncs it in one go.
pub struct IndexOutput {
    pub name: String,
    buffer: Vec<u8>,
}

impl IndexOutput {
    pub fn new(name: impl Into<String>) -> Self {
        IndexOutput {
            name: name.into(),
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Current file pointer
    pub fn position(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn write_byte(&mut self, b: u8) {
        self.buffer.push(b);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_int(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_long(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_vint(&mut self, mut value: u32) {
        while value >= 0x80 {
            self.buffer.push((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
        self.buffer.push(value as u8);
    }

    pub fn write_vlong(&mut self, mut value: u64) {
        debug_assert!(value <= i64::MAX as u64, "vlong must fit in 63 bits");
        while value >= 0x80 {
            self.buffer.push((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
        self.buffer.push(value as u8);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_vint(s.len() as u32);
        self.buffer.extend_from_slice(s.as_bytes());
    }

    /// Overwrite a long written earlier at `pos`
    pub fn patch_long(&mut self, pos: u64, value: i64) -> Result<()> {
        let start = pos as usize;
        match self.buffer.get_mut(start..start + 8) {
            Some(slot) => {
                slot.copy_from_slice(&value.to_be_bytes());
                Ok(())
            }
            None => Err(crate::core::error::Error::invalid_argument(format!(
                "{}: cannot patch long at {} (len={})",
                self.name,
                pos,
                self.buffer.len()
            ))),
        }
    }

    /// Append everything written to `other` so far
    pub fn append(&mut self, other: &IndexOutput) {
        self.buffer.extend_from_slice(&other.buffer);
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// CRC32 of all bytes written so far
    pub fn checksum(&self) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(&self.buffer);
        hasher.finalize()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Write the file durably into `dir` under this output's name
    pub fn finish(self, dir: &dyn Directory) -> Result<u64> {
        let len = self.buffer.len() as u64;
        dir.write_file(&self.name, self.buffer)?;
        Ok(len)
    }
}
