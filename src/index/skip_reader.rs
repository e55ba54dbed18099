use bytes::Bytes;
use crate::core::error::{Error, Result};
use crate::core::types::NO_MORE_DOCS;
use crate::index::skip_writer::num_skip_levels;
use crate::store::data_input::IndexInput;

/// Sentinel skip doc of an exhausted level
const EXHAUSTED: u64 = u64::MAX;

/// Cursor over one skip level: either an owned copy of the level's bytes
/// or a clone of the postings file input
enum SkipStream {
    Buffered { base: u64, input: IndexInput },
    Shared(IndexInput),
}

impl SkipStream {
    fn position(&self) -> u64 {
        match self {
            SkipStream::Buffered { base, input } => base + input.position(),
            SkipStream::Shared(input) => input.position(),
        }
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        match self {
            SkipStream::Buffered { base, input } => {
                let rel = pos
                    .checked_sub(*base)
                    .ok_or_else(|| input.corrupt(format!("child pointer {} before level start {}", pos, base)))?;
                input.seek(rel)
            }
            SkipStream::Shared(input) => input.seek(pos),
        }
    }

    fn input(&mut self) -> &mut IndexInput {
        match self {
            SkipStream::Buffered { input, .. } => input,
            SkipStream::Shared(input) => input,
        }
    }
}

/// Reads the multi-level skip data written by `SkipListWriter` and jumps
/// close to a target document without decoding the postings in between.
///
/// Levels are loaded lazily on the first `skip_to`. The top
/// `skip_levels_to_buffer` levels are copied into owned buffers when they
/// are no longer than `max_buffered_bytes`.
pub struct SkipListReader {
    postings: IndexInput,
    skip_interval: u32,
    max_levels: u32,
    levels_to_buffer: usize,
    max_buffered_bytes: usize,

    doc_count: u64,
    store_payloads: bool,
    num_levels: usize,
    loaded: bool,
    /// Postings covered by one entry of each level
    level_interval: Vec<u64>,
    streams: Vec<Option<SkipStream>>,
    skip_pointer: Vec<u64>,
    /// Doc of the next unconsumed entry per level
    skip_doc: Vec<u64>,
    num_skipped: Vec<u64>,
    child_pointer: Vec<u64>,
    freq_pointer: Vec<u64>,
    prox_pointer: Vec<u64>,
    payload_length: Vec<u32>,

    last_doc: u64,
    last_child_pointer: u64,
    last_freq_pointer: u64,
    last_prox_pointer: u64,
    last_payload_length: u32,
}

impl SkipListReader {
    pub fn new(
        postings: IndexInput,
        skip_interval: u32,
        max_levels: u32,
        levels_to_buffer: usize,
        max_buffered_bytes: usize,
    ) -> Self {
        let n = max_levels as usize;
        let mut level_interval = Vec::with_capacity(n);
        let mut span = skip_interval as u64;
        for _ in 0..n {
            level_interval.push(span);
            span = span.saturating_mul(skip_interval as u64);
        }
        SkipListReader {
            postings,
            skip_interval,
            max_levels,
            levels_to_buffer,
            max_buffered_bytes,
            doc_count: 0,
            store_payloads: false,
            num_levels: 0,
            loaded: false,
            level_interval,
            streams: (0..n).map(|_| None).collect(),
            skip_pointer: vec![0; n],
            skip_doc: vec![0; n],
            num_skipped: vec![0; n],
            child_pointer: vec![0; n],
            freq_pointer: vec![0; n],
            prox_pointer: vec![0; n],
            payload_length: vec![0; n],
            last_doc: 0,
            last_child_pointer: 0,
            last_freq_pointer: 0,
            last_prox_pointer: 0,
            last_payload_length: 0,
        }
    }

    /// Prepare for the skip data of one term
    pub fn init(&mut self, skip_pointer: u64, freq_base: u64, prox_base: u64, doc_freq: u32, store_payloads: bool) {
        self.skip_pointer[0] = skip_pointer;
        self.doc_count = doc_freq as u64;
        self.store_payloads = store_payloads;
        self.num_levels = num_skip_levels(doc_freq, self.skip_interval, self.max_levels);
        self.loaded = false;
        for level in 0..self.max_levels as usize {
            self.streams[level] = None;
            self.skip_doc[level] = 0;
            self.num_skipped[level] = 0;
            self.child_pointer[level] = 0;
            self.freq_pointer[level] = freq_base;
            self.prox_pointer[level] = prox_base;
            self.payload_length[level] = 0;
        }
        self.last_doc = 0;
        self.last_child_pointer = 0;
        self.last_freq_pointer = freq_base;
        self.last_prox_pointer = prox_base;
        self.last_payload_length = 0;
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Doc of the last consumed skip entry, 0 if none
    pub fn doc(&self) -> u32 {
        self.last_doc as u32
    }

    /// `.frq` offset of the posting following the last consumed entry
    pub fn freq_pointer(&self) -> u64 {
        self.last_freq_pointer
    }

    /// `.prx` offset of the positions following the last consumed entry
    pub fn prox_pointer(&self) -> u64 {
        self.last_prox_pointer
    }

    /// Payload length in effect at the last consumed entry
    pub fn payload_length(&self) -> u32 {
        self.last_payload_length
    }

    /// Consume every skip entry whose doc is < `target`; returns the number
    /// of postings covered by the consumed entries
    pub fn skip_to(&mut self, target: u32) -> Result<u64> {
        if self.num_levels == 0 {
            return Ok(0);
        }
        if !self.loaded {
            self.load_skip_levels()?;
            self.loaded = true;
        }
        let target = target as u64;

        // climb while the next entry one level up is still below target
        let mut level = 0usize;
        while level + 1 < self.num_levels && target > self.skip_doc[level + 1] {
            level += 1;
        }

        loop {
            if target > self.skip_doc[level] {
                if !self.load_next_skip(level)? {
                    continue;
                }
            } else {
                if level > 0 {
                    let below = self.streams[level - 1]
                        .as_ref()
                        .map_or(0, |stream| stream.position());
                    if self.last_child_pointer > below {
                        self.seek_child(level - 1)?;
                    }
                }
                if level == 0 {
                    break;
                }
                level -= 1;
            }
        }

        Ok(self.num_skipped[0].saturating_sub(self.level_interval[0]))
    }

    fn load_next_skip(&mut self, level: usize) -> Result<bool> {
        self.set_last_skip_data(level);
        self.num_skipped[level] = self.num_skipped[level].saturating_add(self.level_interval[level]);
        if self.num_skipped[level] >= self.doc_count {
            self.skip_doc[level] = EXHAUSTED;
            if self.num_levels > level {
                self.num_levels = level.max(1);
            }
            return Ok(false);
        }
        let delta = self.read_skip_data(level)?;
        let doc = match self.skip_doc[level].checked_add(delta as u64) {
            Some(doc) if doc < NO_MORE_DOCS as u64 => doc,
            _ => return Err(self.corrupt(level, format!("skip doc delta {} out of range", delta))),
        };
        self.skip_doc[level] = doc;
        if level > 0 {
            self.child_pointer[level] = self.read_child_pointer(level)?;
        }
        Ok(true)
    }

    fn seek_child(&mut self, level: usize) -> Result<()> {
        let pointer = self.last_child_pointer;
        self.stream(level)?.seek(pointer)?;
        self.num_skipped[level] = self.num_skipped[level + 1].saturating_sub(self.level_interval[level + 1]);
        self.skip_doc[level] = self.last_doc;
        self.freq_pointer[level] = self.last_freq_pointer;
        self.prox_pointer[level] = self.last_prox_pointer;
        self.payload_length[level] = self.last_payload_length;
        if level > 0 {
            self.child_pointer[level] = self.read_child_pointer(level)?;
        }
        Ok(())
    }

    fn set_last_skip_data(&mut self, level: usize) {
        self.last_doc = self.skip_doc[level];
        self.last_child_pointer = self.child_pointer[level];
        self.last_freq_pointer = self.freq_pointer[level];
        self.last_prox_pointer = self.prox_pointer[level];
        self.last_payload_length = self.payload_length[level];
    }

    fn read_skip_data(&mut self, level: usize) -> Result<u32> {
        let store_payloads = self.store_payloads;
        let input = self.stream(level)?.input();
        let mut payload_length = None;
        let delta = if store_payloads {
            let code = input.read_vint()?;
            if code & 1 != 0 {
                payload_length = Some(input.read_vint()?);
            }
            code >> 1
        } else {
            input.read_vint()?
        };
        let freq_delta = input.read_vlong()?;
        let prox_delta = input.read_vlong()?;

        if let Some(length) = payload_length {
            self.payload_length[level] = length;
        }
        let freq = self.freq_pointer[level].checked_add(freq_delta);
        let prox = self.prox_pointer[level].checked_add(prox_delta);
        match (freq, prox) {
            (Some(freq), Some(prox)) => {
                self.freq_pointer[level] = freq;
                self.prox_pointer[level] = prox;
                Ok(delta)
            }
            _ => Err(self.corrupt(level, "file pointer overflow")),
        }
    }

    /// Absolute start of the child entry in the level below
    fn read_child_pointer(&mut self, level: usize) -> Result<u64> {
        let child = self.stream(level)?.input().read_vlong()?;
        match child.checked_add(self.skip_pointer[level - 1]) {
            Some(pointer) => Ok(pointer),
            None => Err(self.corrupt(level, format!("child pointer delta {} overflows", child))),
        }
    }

    fn stream(&mut self, level: usize) -> Result<&mut SkipStream> {
        match self.streams[level].as_mut() {
            Some(stream) => Ok(stream),
            None => Err(Error::corrupt(self.postings.name(), 0, format!("skip level {} not loaded", level))),
        }
    }

    fn corrupt(&self, level: usize, msg: impl std::fmt::Display) -> Error {
        let offset = self.streams[level].as_ref().map_or(0, |s| s.position());
        Error::corrupt(self.postings.name(), offset, format!("skip level {}: {}", level, msg))
    }

    fn load_skip_levels(&mut self) -> Result<()> {
        let mut input = self.postings.clone();
        input.seek(self.skip_pointer[0])?;
        let mut to_buffer = self.levels_to_buffer;

        for level in (1..self.num_levels).rev() {
            let length = input.read_vlong()?;
            let start = input.position();
            self.skip_pointer[level] = start;
            if length > input.remaining() {
                return Err(input.corrupt(format!("skip level {} of {} bytes past EOF", level, length)));
            }
            if to_buffer > 0 && length <= self.max_buffered_bytes as u64 {
                let copy = Bytes::copy_from_slice(input.read_bytes(length as usize)?);
                let name = format!("{} (skip level {})", input.name(), level);
                self.streams[level] = Some(SkipStream::Buffered {
                    base: start,
                    input: IndexInput::new(name, copy),
                });
            } else {
                self.streams[level] = Some(SkipStream::Shared(input.clone()));
                input.skip_bytes(length)?;
            }
            to_buffer = to_buffer.saturating_sub(1);
        }

        self.skip_pointer[0] = input.position();
        self.streams[0] = Some(SkipStream::Shared(input));
        Ok(())
    }
}
