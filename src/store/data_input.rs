use bytes::Bytes;
use crate::core::error::{Error, Result};

/// Read cursor over an immutable, shared file image.
///
/// Cloning is cheap: the underlying bytes are reference counted, every clone
/// carries its own position.
#[derive(Clone)]
pub struct IndexInput {
    name: String,
    data: Bytes,
    pos: usize,
}

impl IndexInput {
    pub fn new(name: impl Into<String>, data: Bytes) -> Self {
        IndexInput { name: name.into(), data, pos: 0 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    pub fn remaining(&self) -> u64 {
        (self.data.len() - self.pos) as u64
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.data.len() as u64 {
            return Err(self.corrupt(format!("seek past end (len={})", self.data.len())));
        }
        self.pos = pos as usize;
        Ok(())
    }

    /// Shared view of the whole file
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Independent input over `[start, start + len)` of this file
    pub fn slice(&self, start: u64, len: u64) -> Result<IndexInput> {
        let end = start.checked_add(len).filter(|&end| end <= self.data.len() as u64);
        match end {
            Some(end) => Ok(IndexInput {
                name: self.name.clone(),
                data: self.data.slice(start as usize..end as usize),
                pos: 0,
            }),
            None => Err(self.corrupt(format!("slice [{}+{}] out of bounds", start, len))),
        }
    }

    pub fn corrupt(&self, msg: impl std::fmt::Display) -> Error {
        Error::corrupt(&self.name, self.pos as u64, msg)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        match self.data.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(self.corrupt("read past EOF")),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let start = self.pos;
                self.pos = end;
                Ok(&self.data[start..end])
            }
            None => Err(self.corrupt(format!("read of {} bytes past EOF", len))),
        }
    }

    pub fn skip_bytes(&mut self, len: u64) -> Result<()> {
        let target = self.pos as u64 + len;
        self.seek(target)
    }

    pub fn read_int(&mut self) -> Result<i32> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_long(&mut self) -> Result<i64> {
        let b = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(i64::from_be_bytes(buf))
    }

    /// Variable-length int, 7 bits per byte, low bits first (max 5 bytes)
    pub fn read_vint(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 28 {
                return Err(self.corrupt("invalid vint: more than 5 bytes"));
            }
        }
    }

    /// Variable-length long (max 9 bytes, the value must fit in 63 bits)
    pub fn read_vlong(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 56 {
                return Err(self.corrupt("invalid vlong: more than 9 bytes"));
            }
        }
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        let start = self.pos as u64;
        let bytes = self.read_bytes(len)?;
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            Err(e) => Err(Error::corrupt(&self.name, start, format!("invalid UTF-8 string: {}", e))),
        }
    }
}

impl std::fmt::Debug for IndexInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IndexInput({}, pos={}, len={})", self.name, self.pos, self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::store::data_output::IndexOutput;

    #[test]
    fn reads_back_primitive_encodings() {
        let mut out = IndexOutput::new("test.bin");
        out.write_int(-11);
        out.write_long(1 << 40);
        out.write_vint(300);
        out.write_vlong(u32::MAX as u64 + 7);
        out.write_string("héllo");

        let mut input = IndexInput::new("test.bin", Bytes::from(out.into_bytes()));
        assert_eq!(input.read_int().unwrap(), -11);
        assert_eq!(input.read_long().unwrap(), 1 << 40);
        assert_eq!(input.read_vint().unwrap(), 300);
        assert_eq!(input.read_vlong().unwrap(), u32::MAX as u64 + 7);
        assert_eq!(input.read_string().unwrap(), "héllo");
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn truncated_input_reports_file_and_offset() {
        let mut input = IndexInput::new("_0.frq", Bytes::from_static(&[0x80, 0x80]));
        let err = input.read_vint().unwrap_err();
        assert_eq!(err.kind, ErrorKind::CorruptIndex);
        assert!(err.context.contains("_0.frq"));
        assert!(err.context.contains("offset=2"));
    }

    #[test]
    fn overlong_vint_is_corruption() {
        let mut input = IndexInput::new("x", Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]));
        assert_eq!(input.read_vint().unwrap_err().kind, ErrorKind::CorruptIndex);
    }
}
