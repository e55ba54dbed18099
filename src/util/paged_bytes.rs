use crate::core::error::{Error, Result};

const MAX_PAGE_BITS: u32 = 18; // 256 KB block
const MIN_PAGE_BITS: u32 = 4;

/// Append-only byte store split into fixed-size pages.
///
/// Records are written through `PagedBytesOutput` and addressed by their
/// absolute start offset; once frozen the store is read-only and can be shared
/// by any number of readers.
#[derive(Debug)]
pub struct PagedBytes {
    pages: Vec<Vec<u8>>,
    page_bits: u32,
    page_size: usize,
    frozen: bool,
}

impl PagedBytes {
    pub fn new(page_bits: u32) -> Self {
        let page_bits = page_bits.clamp(MIN_PAGE_BITS, MAX_PAGE_BITS);
        let page_size = 1usize << page_bits;
        PagedBytes {
            pages: vec![Vec::with_capacity(page_size)],
            page_bits,
            page_size,
            frozen: false,
        }
    }

    /// Page size for a store expected to hold about `estimated_size` bytes
    pub fn estimate_page_bits(estimated_size: u64) -> u32 {
        (64 - estimated_size.leading_zeros()).clamp(MIN_PAGE_BITS, MAX_PAGE_BITS)
    }

    pub fn page_bits(&self) -> u32 {
        self.page_bits
    }

    /// Absolute offset of the next byte to be written
    pub fn position(&self) -> u64 {
        let full = (self.pages.len() - 1) as u64 * self.page_size as u64;
        full + self.pages.last().map_or(0, |p| p.len()) as u64
    }

    pub fn output(&mut self) -> Result<PagedBytesOutput<'_>> {
        if self.frozen {
            return Err(Error::invalid_state("PagedBytes is frozen"));
        }
        Ok(PagedBytesOutput { bytes: self })
    }

    /// Stop accepting writes and release unused capacity
    pub fn freeze(&mut self) {
        if let Some(last) = self.pages.last_mut() {
            last.shrink_to_fit();
        }
        self.frozen = true;
    }

    pub fn input(&self, position: u64) -> Result<PagedBytesInput<'_>> {
        if position > self.position() {
            return Err(Error::invalid_argument(format!("position {} past end {}", position, self.position())));
        }
        Ok(PagedBytesInput { bytes: self, pos: position })
    }

    fn push_byte(&mut self, b: u8) {
        if self.pages.last().map_or(true, |p| p.len() == self.page_size) {
            self.pages.push(Vec::with_capacity(self.page_size));
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(b);
        }
    }

    fn byte_at(&self, pos: u64) -> Option<u8> {
        let page = (pos >> self.page_bits) as usize;
        let offset = (pos as usize) & (self.page_size - 1);
        self.pages.get(page).and_then(|p| p.get(offset)).copied()
    }

    pub fn ram_bytes_used(&self) -> usize {
        self.pages.iter().map(|p| p.capacity()).sum()
    }
}

pub struct PagedBytesOutput<'a> {
    bytes: &'a mut PagedBytes,
}

impl PagedBytesOutput<'_> {
    pub fn position(&self) -> u64 {
        self.bytes.position()
    }

    pub fn write_byte(&mut self, b: u8) {
        self.bytes.push_byte(b);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        for &b in data {
            self.bytes.push_byte(b);
        }
    }

    pub fn write_vint(&mut self, mut value: u32) {
        while value >= 0x80 {
            self.write_byte((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
        self.write_byte(value as u8);
    }

    pub fn write_vlong(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.write_byte((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
        self.write_byte(value as u8);
    }

    pub fn write_bytes_with_len(&mut self, data: &[u8]) {
        self.write_vint(data.len() as u32);
        self.write_bytes(data);
    }
}

/// Independent read cursor; many may exist over one frozen store
#[derive(Clone)]
pub struct PagedBytesInput<'a> {
    bytes: &'a PagedBytes,
    pos: u64,
}

impl PagedBytesInput<'_> {
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn set_position(&mut self, pos: u64) {
        self.pos = pos;
    }

    fn corrupt(&self, msg: &str) -> Error {
        Error::corrupt("PagedBytes", self.pos, msg)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        match self.bytes.byte_at(self.pos) {
            Some(b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(self.corrupt("read past end")),
        }
    }

    pub fn read_vint(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0;
        loop {
            let b = self.read_byte()?;
            value |= ((b & 0x7F) as u32) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 28 {
                return Err(self.corrupt("invalid vint"));
            }
        }
    }

    pub fn read_vlong(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0;
        loop {
            let b = self.read_byte()?;
            value |= ((b & 0x7F) as u64) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 56 {
                return Err(self.corrupt("invalid vlong"));
            }
        }
    }

    pub fn read_bytes_into(&mut self, buf: &mut Vec<u8>, len: usize) -> Result<()> {
        buf.clear();
        buf.reserve(len);
        for _ in 0..len {
            let b = self.read_byte()?;
            buf.push(b);
        }
        Ok(())
    }

    pub fn read_bytes_with_len(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        let len = self.read_vint()? as usize;
        self.read_bytes_into(buf, len)
    }
}
