use log::trace;
use crate::codec::FormatParams;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Position};
use crate::index::field_infos::FieldInfo;
use crate::index::file_names::{FREQ_EXTENSION, PROX_EXTENSION, segment_file_name};
use crate::index::skip_writer::SkipListWriter;
use crate::index::term::TermInfo;
use crate::store::data_output::IndexOutput;
use crate::store::directory::Directory;

pub const FREQ_CODEC: &str = "Frequencies";
pub const PROX_CODEC: &str = "Positions";

/// Writes the `.frq` and `.prx` files of a segment, one term at a time.
///
/// Call order per term: `start_term`, then `add_doc` with increasing doc
/// ids, each followed by exactly `freq` calls to `add_position` unless the
/// field omits positions, then `finish_term` for the dictionary entry.
pub struct PostingsWriter {
    freq: IndexOutput,
    prox: IndexOutput,
    params: FormatParams,
    skip: SkipListWriter,

    store_payloads: bool,
    omit_positions: bool,
    in_term: bool,
    doc_freq: u32,
    last_doc: DocId,
    freq_start: u64,
    prox_start: u64,
    pending_positions: u32,
    last_position: u32,
    last_payload_length: Option<u32>,
}

impl PostingsWriter {
    pub fn new(segment: &str, params: FormatParams) -> Self {
        let mut freq = IndexOutput::new(segment_file_name(segment, FREQ_EXTENSION));
        let mut prox = IndexOutput::new(segment_file_name(segment, PROX_EXTENSION));
        params.write_header(&mut freq, FREQ_CODEC);
        params.write_header(&mut prox, PROX_CODEC);
        PostingsWriter {
            freq,
            prox,
            params,
            skip: SkipListWriter::new(params.skip_interval, params.max_skip_levels),
            store_payloads: false,
            omit_positions: false,
            in_term: false,
            doc_freq: 0,
            last_doc: 0,
            freq_start: 0,
            prox_start: 0,
            pending_positions: 0,
            last_position: 0,
            last_payload_length: None,
        }
    }

    pub fn start_term(&mut self, field: &FieldInfo) -> Result<()> {
        if self.in_term {
            return Err(Error::invalid_state("previous term was not finished"));
        }
        self.in_term = true;
        self.store_payloads = field.store_payloads;
        self.omit_positions = field.omit_positions;
        self.doc_freq = 0;
        self.last_doc = 0;
        self.freq_start = self.freq.position();
        self.prox_start = self.prox.position();
        self.pending_positions = 0;
        self.last_payload_length = None;
        self.skip.reset(self.freq_start, self.prox_start, self.store_payloads);
        Ok(())
    }

    pub fn add_doc(&mut self, doc: DocId, freq: u32) -> Result<()> {
        if !self.in_term {
            return Err(Error::invalid_state("add_doc outside of a term"));
        }
        if self.pending_positions > 0 {
            return Err(Error::invalid_state(format!(
                "doc {} is missing {} positions",
                self.last_doc, self.pending_positions
            )));
        }
        if self.doc_freq > 0 && doc <= self.last_doc {
            return Err(Error::invalid_argument(format!(
                "docs out of order: {} after {}",
                doc, self.last_doc
            )));
        }
        if freq == 0 {
            return Err(Error::invalid_argument(format!("doc {} added with freq 0", doc)));
        }

        if self.doc_freq > 0 && self.doc_freq % self.params.skip_interval == 0 {
            self.skip.set_skip_data(
                self.last_doc,
                self.freq.position(),
                self.prox.position(),
                self.last_payload_length.unwrap_or(0),
            );
            self.skip.buffer_skip(self.doc_freq)?;
        }

        let delta = doc - self.last_doc;
        if freq == 1 {
            self.freq.write_vint(delta << 1 | 1);
        } else {
            self.freq.write_vint(delta << 1);
            self.freq.write_vint(freq);
        }
        self.last_doc = doc;
        self.doc_freq += 1;
        self.last_position = 0;
        if !self.omit_positions {
            self.pending_positions = freq;
        }
        Ok(())
    }

    pub fn add_position(&mut self, position: &Position) -> Result<()> {
        if self.pending_positions == 0 {
            return Err(Error::invalid_state(format!("too many positions for doc {}", self.last_doc)));
        }
        if position.position < self.last_position {
            return Err(Error::invalid_argument(format!(
                "positions out of order in doc {}: {} after {}",
                self.last_doc, position.position, self.last_position
            )));
        }
        let delta = position.position - self.last_position;
        if self.store_payloads {
            let payload = position.payload.as_deref().unwrap_or(&[]);
            let length = payload.len() as u32;
            if self.last_payload_length != Some(length) {
                self.prox.write_vint(delta << 1 | 1);
                self.prox.write_vint(length);
                self.last_payload_length = Some(length);
            } else {
                self.prox.write_vint(delta << 1);
            }
            self.prox.write_bytes(payload);
        } else {
            self.prox.write_vint(delta);
        }
        self.last_position = position.position;
        self.pending_positions -= 1;
        Ok(())
    }

    /// Close the current term; the returned entry goes into the term dictionary
    pub fn finish_term(&mut self) -> Result<TermInfo> {
        if !self.in_term {
            return Err(Error::invalid_state("finish_term outside of a term"));
        }
        if self.pending_positions > 0 {
            return Err(Error::invalid_state(format!(
                "doc {} is missing {} positions",
                self.last_doc, self.pending_positions
            )));
        }
        if self.doc_freq == 0 {
            return Err(Error::invalid_state("term without documents"));
        }
        self.in_term = false;

        let mut skip_offset = 0;
        if self.doc_freq > self.params.skip_interval {
            let skip_pointer = self.freq.position();
            self.skip.write_skip(&mut self.freq, self.doc_freq);
            skip_offset = u32::try_from(skip_pointer - self.freq_start)
                .map_err(|_| Error::invalid_argument("postings of a single term exceed 4GB"))?;
        }
        trace!("term postings: df={} freq@{} skip+{}", self.doc_freq, self.freq_start, skip_offset);
        Ok(TermInfo {
            doc_freq: self.doc_freq,
            freq_pointer: self.freq_start,
            prox_pointer: self.prox_start,
            skip_offset,
        })
    }

    /// Write both files; returns their names
    pub fn finish(mut self, dir: &dyn Directory) -> Result<Vec<String>> {
        if self.in_term {
            return Err(Error::invalid_state("last term was not finished"));
        }
        let names = vec![self.freq.name.clone(), self.prox.name.clone()];
        self.params.write_trailer(&mut self.freq);
        self.params.write_trailer(&mut self.prox);
        self.freq.finish(dir)?;
        self.prox.finish(dir)?;
        Ok(names)
    }
}
