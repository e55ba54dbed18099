use crate::core::error::{Error, Result};
use crate::store::data_output::IndexOutput;

/// Number of skip levels for a posting list of `doc_freq` entries.
///
/// Level `k` holds an entry every `interval^(k+1)` postings and exists only
/// when it has at least one entry, i.e. `interval^(k+1) < doc_freq`.
pub fn num_skip_levels(doc_freq: u32, skip_interval: u32, max_levels: u32) -> usize {
    let mut levels = 0usize;
    let mut span = skip_interval as u64;
    while (levels as u32) < max_levels && span < doc_freq as u64 {
        levels += 1;
        span = span.saturating_mul(skip_interval as u64);
    }
    levels
}

/// Buffers the skip levels of one posting list while it is written.
///
/// Before posting `n` is written (with `n` a multiple of the interval) the
/// postings writer records the last written doc and the current file
/// pointers with `set_skip_data` and calls `buffer_skip(n)`. Level `k` gets
/// an entry whenever `n` is a multiple of `interval^(k+1)`; entries above
/// level 0 also carry a pointer to the matching entry one level down.
///
/// The final doc freq need not be known up front: levels only receive
/// entries below the doc freq, so exactly `num_skip_levels(doc_freq)`
/// levels are non-empty when `write_skip` runs.
pub struct SkipListWriter {
    skip_interval: u32,
    store_payloads: bool,
    buffers: Vec<IndexOutput>,
    last_doc: Vec<u32>,
    last_freq_pointer: Vec<u64>,
    last_prox_pointer: Vec<u64>,
    last_payload_length: Vec<Option<u32>>,
    cur_doc: u32,
    cur_freq_pointer: u64,
    cur_prox_pointer: u64,
    cur_payload_length: u32,
}

impl SkipListWriter {
    pub fn new(skip_interval: u32, max_levels: u32) -> Self {
        let n = max_levels as usize;
        SkipListWriter {
            skip_interval,
            store_payloads: false,
            buffers: (0..n).map(|l| IndexOutput::new(format!("skip level {}", l))).collect(),
            last_doc: vec![0; n],
            last_freq_pointer: vec![0; n],
            last_prox_pointer: vec![0; n],
            last_payload_length: vec![None; n],
            cur_doc: 0,
            cur_freq_pointer: 0,
            cur_prox_pointer: 0,
            cur_payload_length: 0,
        }
    }

    /// Start the skip data of a new term
    pub fn reset(&mut self, freq_start: u64, prox_start: u64, store_payloads: bool) {
        self.store_payloads = store_payloads;
        for buffer in &mut self.buffers {
            buffer.clear();
        }
        self.last_doc.fill(0);
        self.last_freq_pointer.fill(freq_start);
        self.last_prox_pointer.fill(prox_start);
        self.last_payload_length.fill(None);
    }

    /// Values of the next entry: last consumed doc and pointers to the next posting
    pub fn set_skip_data(&mut self, doc: u32, freq_pointer: u64, prox_pointer: u64, payload_length: u32) {
        self.cur_doc = doc;
        self.cur_freq_pointer = freq_pointer;
        self.cur_prox_pointer = prox_pointer;
        self.cur_payload_length = payload_length;
    }

    /// Record an entry for `consumed` postings on every level it belongs to
    pub fn buffer_skip(&mut self, consumed: u32) -> Result<()> {
        if consumed == 0 || consumed % self.skip_interval != 0 {
            return Err(Error::invalid_argument(format!(
                "skip entry at {} is not a multiple of {}",
                consumed, self.skip_interval
            )));
        }
        let mut levels = 0usize;
        let mut rest = consumed;
        while levels < self.buffers.len() && rest % self.skip_interval == 0 {
            levels += 1;
            rest /= self.skip_interval;
        }

        let mut child_pointer = 0u64;
        for level in 0..levels {
            self.write_entry(level)?;
            let next_child = self.buffers[level].position();
            if level > 0 {
                self.buffers[level].write_vlong(child_pointer);
            }
            child_pointer = next_child;
        }
        Ok(())
    }

    fn write_entry(&mut self, level: usize) -> Result<()> {
        if self.cur_doc < self.last_doc[level]
            || self.cur_freq_pointer < self.last_freq_pointer[level]
            || self.cur_prox_pointer < self.last_prox_pointer[level]
        {
            return Err(Error::invalid_argument(format!("skip data goes backwards on level {}", level)));
        }
        let out = &mut self.buffers[level];
        let delta = self.cur_doc - self.last_doc[level];
        if self.store_payloads {
            if self.last_payload_length[level] != Some(self.cur_payload_length) {
                out.write_vint(delta << 1 | 1);
                out.write_vint(self.cur_payload_length);
                self.last_payload_length[level] = Some(self.cur_payload_length);
            } else {
                out.write_vint(delta << 1);
            }
        } else {
            out.write_vint(delta);
        }
        out.write_vlong(self.cur_freq_pointer - self.last_freq_pointer[level]);
        out.write_vlong(self.cur_prox_pointer - self.last_prox_pointer[level]);

        self.last_doc[level] = self.cur_doc;
        self.last_freq_pointer[level] = self.cur_freq_pointer;
        self.last_prox_pointer[level] = self.cur_prox_pointer;
        Ok(())
    }

    /// Append the buffered levels of a list of `doc_freq` postings to `out`:
    /// highest level first, each length prefixed, level 0 last without one
    pub fn write_skip(&self, out: &mut IndexOutput, doc_freq: u32) {
        let levels = num_skip_levels(doc_freq, self.skip_interval, self.buffers.len() as u32);
        for level in (1..levels).rev() {
            out.write_vlong(self.buffers[level].position());
            out.append(&self.buffers[level]);
        }
        if levels > 0 {
            out.append(&self.buffers[0]);
        }
    }
}
