use crate::codec::FormatParams;
use crate::core::config::UpgradeConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, NO_MORE_DOCS, Position, Posting};
use crate::index::field_infos::FieldInfo;
use crate::index::skip_reader::SkipListReader;
use crate::index::term::TermInfo;
use crate::store::data_input::IndexInput;

/// Decoding state that `floor` snapshots and restores
#[derive(Clone)]
struct Cursor {
    freq_pos: u64,
    prox_pos: u64,
    count: u32,
    doc: DocId,
    freq: u32,
    started: bool,
    exhausted: bool,
    /// Positions of earlier docs still to be skipped in `.prx`
    prox_pending: u64,
    payload_length: u32,
    /// Decoded positions of the current doc
    positions: Option<Vec<Position>>,
}

/// Iterator over the postings of one term.
///
/// Positions are decoded lazily: documents whose positions are never asked
/// for are skipped in `.prx` only when a later document's positions are read.
pub struct SegmentPostings {
    freq_in: IndexInput,
    prox_in: IndexInput,
    term_info: TermInfo,
    store_payloads: bool,
    omit_positions: bool,
    params: FormatParams,
    levels_to_buffer: usize,
    max_buffered_bytes: usize,
    skip: Option<SkipListReader>,
    cur: Cursor,
}

impl SegmentPostings {
    pub fn new(
        mut freq_in: IndexInput,
        mut prox_in: IndexInput,
        field: &FieldInfo,
        term_info: TermInfo,
        params: FormatParams,
        config: &UpgradeConfig,
    ) -> Result<Self> {
        freq_in.seek(term_info.freq_pointer)?;
        prox_in.seek(term_info.prox_pointer)?;
        Ok(SegmentPostings {
            cur: Cursor {
                freq_pos: term_info.freq_pointer,
                prox_pos: term_info.prox_pointer,
                count: 0,
                doc: 0,
                freq: 0,
                started: false,
                exhausted: term_info.doc_freq == 0,
                prox_pending: 0,
                payload_length: 0,
                positions: None,
            },
            freq_in,
            prox_in,
            term_info,
            store_payloads: field.store_payloads,
            omit_positions: field.omit_positions,
            params,
            levels_to_buffer: config.skip_levels_to_buffer,
            max_buffered_bytes: config.max_buffered_skip_bytes,
            skip: None,
        })
    }

    pub fn doc_freq(&self) -> u32 {
        self.term_info.doc_freq
    }

    /// Current doc; `NO_MORE_DOCS` once exhausted
    pub fn doc(&self) -> DocId {
        if self.cur.exhausted { NO_MORE_DOCS } else { self.cur.doc }
    }

    pub fn freq(&self) -> u32 {
        self.cur.freq
    }

    /// Advance to the next document
    pub fn next(&mut self) -> Result<Option<DocId>> {
        if self.cur.exhausted {
            return Ok(None);
        }
        if self.cur.count >= self.term_info.doc_freq {
            self.cur.exhausted = true;
            return Ok(None);
        }
        if self.cur.started && self.cur.positions.is_none() && !self.omit_positions {
            self.cur.prox_pending += self.cur.freq as u64;
        }
        self.cur.positions = None;

        let code = self.freq_in.read_vint()?;
        let delta = code >> 1;
        let freq = if code & 1 != 0 { 1 } else { self.freq_in.read_vint()? };
        if freq == 0 {
            return Err(self.freq_in.corrupt("posting with freq 0"));
        }
        let doc = if self.cur.started {
            if delta == 0 {
                return Err(self.freq_in.corrupt(format!("docs out of order: {} repeated", self.cur.doc)));
            }
            self.cur.doc.checked_add(delta)
        } else {
            Some(delta)
        };
        let doc = match doc {
            Some(doc) if doc < NO_MORE_DOCS => doc,
            _ => return Err(self.freq_in.corrupt("doc id overflow")),
        };

        self.cur.doc = doc;
        self.cur.freq = freq;
        self.cur.count += 1;
        self.cur.started = true;
        Ok(Some(doc))
    }

    /// Advance to the first doc >= `target`
    pub fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>> {
        if self.cur.exhausted {
            return Ok(None);
        }
        if self.cur.started && self.cur.doc >= target {
            return Ok(Some(self.cur.doc));
        }
        self.skip_with_list(target)?;
        while let Some(doc) = self.next()? {
            if doc >= target {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    /// Move to the greatest doc <= `target` reachable from the current
    /// position. None when no such doc exists or the current doc is already
    /// past `target`.
    pub fn floor(&mut self, target: DocId) -> Result<Option<DocId>> {
        if self.cur.exhausted || (self.cur.started && self.cur.doc > target) {
            return Ok(None);
        }
        let before_skip = self.save();
        if self.skip_with_list(target)? {
            // landing on the skip doc itself leaves its freq unknown
            match self.next()? {
                Some(doc) if doc <= target => {}
                _ => self.restore(before_skip)?,
            }
        }
        loop {
            let saved = self.save();
            match self.next()? {
                Some(doc) if doc <= target => continue,
                _ => {
                    self.restore(saved)?;
                    break;
                }
            }
        }
        Ok(if self.cur.started && self.cur.doc <= target { Some(self.cur.doc) } else { None })
    }

    /// Positions of the current doc; empty for fields without positions
    pub fn positions(&mut self) -> Result<&[Position]> {
        if !self.cur.started || self.cur.exhausted {
            return Err(Error::invalid_state("positions requested without a current doc"));
        }
        if self.omit_positions {
            return Ok(&[]);
        }
        if self.cur.positions.is_none() {
            for _ in 0..self.cur.prox_pending {
                self.read_position(false)?;
            }
            self.cur.prox_pending = 0;
            let mut positions = Vec::with_capacity(self.cur.freq as usize);
            let mut last = 0u32;
            for _ in 0..self.cur.freq {
                let (delta, payload) = self.read_position(true)?;
                last = last
                    .checked_add(delta)
                    .ok_or_else(|| self.prox_in.corrupt("position overflow"))?;
                positions.push(Position { position: last, payload });
            }
            self.cur.positions = Some(positions);
        }
        Ok(self.cur.positions.as_deref().unwrap_or(&[]))
    }

    /// Current doc as an owned posting
    pub fn posting(&mut self) -> Result<Posting> {
        let doc_id = self.cur.doc;
        let freq = self.cur.freq;
        let positions = self.positions()?.to_vec();
        Ok(Posting { doc_id, freq, positions })
    }

    /// Decode every remaining posting
    pub fn read_all(&mut self) -> Result<Vec<Posting>> {
        let mut postings = Vec::with_capacity(self.term_info.doc_freq as usize);
        while self.next()?.is_some() {
            postings.push(self.posting()?);
        }
        Ok(postings)
    }

    fn read_position(&mut self, keep_payload: bool) -> Result<(u32, Option<Vec<u8>>)> {
        let code = self.prox_in.read_vint()?;
        if !self.store_payloads {
            return Ok((code, None));
        }
        if code & 1 != 0 {
            self.cur.payload_length = self.prox_in.read_vint()?;
        }
        let length = self.cur.payload_length as usize;
        let payload = if length == 0 {
            None
        } else if keep_payload {
            Some(self.prox_in.read_bytes(length)?.to_vec())
        } else {
            self.prox_in.skip_bytes(length as u64)?;
            None
        };
        Ok((code >> 1, payload))
    }

    /// Jump with the skip list past entries below `target`; true when the
    /// cursor moved
    fn skip_with_list(&mut self, target: DocId) -> Result<bool> {
        if self.term_info.doc_freq <= self.params.skip_interval {
            return Ok(false);
        }
        let skip = self.skip.get_or_insert_with(|| {
            let mut skip = SkipListReader::new(
                self.freq_in.clone(),
                self.params.skip_interval,
                self.params.max_skip_levels,
                self.levels_to_buffer,
                self.max_buffered_bytes,
            );
            skip.init(
                self.term_info.freq_pointer + self.term_info.skip_offset as u64,
                self.term_info.freq_pointer,
                self.term_info.prox_pointer,
                self.term_info.doc_freq,
                self.store_payloads,
            );
            skip
        });
        let consumed = skip.skip_to(target)?;
        if consumed <= self.cur.count as u64 {
            return Ok(false);
        }
        let (doc, freq_pointer, prox_pointer, payload_length) =
            (skip.doc(), skip.freq_pointer(), skip.prox_pointer(), skip.payload_length());
        self.freq_in.seek(freq_pointer)?;
        self.prox_in.seek(prox_pointer)?;
        self.cur.count = consumed as u32;
        self.cur.doc = doc;
        self.cur.started = true;
        self.cur.prox_pending = 0;
        self.cur.payload_length = payload_length;
        // positions of the skip doc are behind the prox pointer
        self.cur.positions = Some(Vec::new());
        Ok(true)
    }

    fn save(&self) -> Cursor {
        let mut cursor = self.cur.clone();
        cursor.freq_pos = self.freq_in.position();
        cursor.prox_pos = self.prox_in.position();
        cursor
    }

    fn restore(&mut self, cursor: Cursor) -> Result<()> {
        self.freq_in.seek(cursor.freq_pos)?;
        self.prox_in.seek(cursor.prox_pos)?;
        self.cur = cursor;
        Ok(())
    }
}

impl std::fmt::Debug for SegmentPostings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SegmentPostings(df={}, count={}, doc={})",
            self.term_info.doc_freq, self.cur.count, self.cur.doc
        )
    }
}
