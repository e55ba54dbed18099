use std::cmp::Ordering;
use std::sync::Arc;
use crate::codec::FormatParams;
use crate::core::error::Result;
use crate::index::field_infos::FieldInfos;
use crate::index::generation::Generation;
use crate::index::term::{Term, TermInfo};
use crate::store::data_input::IndexInput;
use crate::store::data_output::IndexOutput;
use crate::util::string_order::compare_utf8_as_utf16;

pub const TERMS_CODEC: &str = "TermInfos";
pub const TERMS_INDEX_CODEC: &str = "TermInfosIndex";

/// Field number of the empty term that opens every term index
pub const NO_FIELD: u32 = u32::MAX;

/// Leading format int of legacy term files
pub(crate) fn legacy_terms_format(generation: Generation) -> Option<i32> {
    match generation {
        Generation::V2 => Some(-3),
        Generation::V3 => Some(-4),
        _ => None,
    }
}

/// Write the term file preamble; returns the offset of the term count slot
pub(crate) fn write_preamble(out: &mut IndexOutput, params: &FormatParams, is_index: bool) -> u64 {
    match legacy_terms_format(params.generation) {
        Some(format) => out.write_int(format),
        None => params.write_header(out, if is_index { TERMS_INDEX_CODEC } else { TERMS_CODEC }),
    }
    let size_pos = out.position();
    out.write_long(0);
    out.write_int(params.term_index_interval as i32);
    out.write_int(params.skip_interval as i32);
    out.write_int(params.max_skip_levels as i32);
    size_pos
}

/// Sequential reader over a `.tis` or `.tii` file.
///
/// Starts positioned before the first term; `next` decodes one prefix coded
/// entry at a time. Clones are independent cursors over the same bytes.
#[derive(Clone)]
pub struct SegmentTermEnum {
    input: IndexInput,
    field_infos: Arc<FieldInfos>,
    is_index: bool,
    size: u64,
    data_end: u64,
    /// Ordinal of the current term, -1 before the first
    position: i64,
    field: u32,
    text: Vec<u8>,
    term_info: TermInfo,
    index_pointer: u64,
    exhausted: bool,
    index_interval: u32,
    skip_interval: u32,
    max_skip_levels: u32,
}

impl SegmentTermEnum {
    pub fn open(mut input: IndexInput, field_infos: Arc<FieldInfos>, params: &FormatParams, is_index: bool) -> Result<Self> {
        let data_end = params.check_trailer(&mut input)?;
        match legacy_terms_format(params.generation) {
            Some(expected) => {
                let format = input.read_int()?;
                if format != expected {
                    return Err(input.corrupt(format!("term file format {} (expected {})", format, expected)));
                }
            }
            None => params.check_header(&mut input, if is_index { TERMS_INDEX_CODEC } else { TERMS_CODEC })?,
        }
        let size = input.read_long()?;
        let index_interval = input.read_int()?;
        let skip_interval = input.read_int()?;
        let max_skip_levels = input.read_int()?;
        if size < 0 || index_interval <= 0 || skip_interval <= 1 || max_skip_levels <= 0 {
            return Err(input.corrupt(format!(
                "invalid term file preamble size={} indexInterval={} skipInterval={} maxSkipLevels={}",
                size, index_interval, skip_interval, max_skip_levels
            )));
        }
        Ok(SegmentTermEnum {
            input,
            field_infos,
            is_index,
            size: size as u64,
            data_end,
            position: -1,
            field: NO_FIELD,
            text: Vec::new(),
            term_info: TermInfo::default(),
            index_pointer: 0,
            exhausted: false,
            index_interval: index_interval as u32,
            skip_interval: skip_interval as u32,
            max_skip_levels: max_skip_levels as u32,
        })
    }

    /// Number of entries in the file
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn index_interval(&self) -> u32 {
        self.index_interval
    }

    pub fn skip_interval(&self) -> u32 {
        self.skip_interval
    }

    pub fn max_skip_levels(&self) -> u32 {
        self.max_skip_levels
    }

    pub fn field_infos(&self) -> &Arc<FieldInfos> {
        &self.field_infos
    }

    /// Advance to the next entry; false once every entry has been read
    pub fn next(&mut self) -> Result<bool> {
        if self.exhausted || self.position + 1 >= self.size as i64 {
            self.exhausted = true;
            return Ok(false);
        }
        let entry_start = self.input.position();
        if entry_start >= self.data_end {
            return Err(self.input.corrupt("term entry starts past end of data"));
        }

        let shared = self.input.read_vint()? as usize;
        let suffix = self.input.read_vint()? as usize;
        if shared > self.text.len() {
            return Err(self.input.corrupt(format!("shared prefix {} longer than previous term {}", shared, self.text.len())));
        }
        let mut text = Vec::with_capacity(shared + suffix);
        text.extend_from_slice(&self.text[..shared]);
        text.extend_from_slice(self.input.read_bytes(suffix)?);
        if std::str::from_utf8(&text).is_err() {
            return Err(self.input.corrupt("term text is not valid UTF-8"));
        }

        let field = self.input.read_vint()?;
        if field != NO_FIELD && self.field_infos.get(field).is_none() {
            return Err(self.input.corrupt(format!("unknown field number {}", field)));
        }

        if self.position >= 0 && self.field != NO_FIELD {
            let order = self.compare_raw(field, &text, self.field, &self.text);
            if order != Ordering::Greater {
                return Err(self.input.corrupt("terms out of order"));
            }
        }

        let doc_freq = self.input.read_vint()?;
        let freq_pointer = self.add_delta(self.term_info.freq_pointer, "freq")?;
        let prox_pointer = self.add_delta(self.term_info.prox_pointer, "prox")?;
        let skip_offset = if doc_freq > self.skip_interval { self.input.read_vint()? } else { 0 };
        if self.is_index {
            self.index_pointer = self.add_delta(self.index_pointer, "index")?;
        }

        self.field = field;
        self.text = text;
        self.term_info = TermInfo { doc_freq, freq_pointer, prox_pointer, skip_offset };
        self.position += 1;
        Ok(true)
    }

    /// Read a vlong pointer delta and add it to `base`
    fn add_delta(&mut self, base: u64, what: &str) -> Result<u64> {
        let delta = self.input.read_vlong()?;
        base.checked_add(delta)
            .ok_or_else(|| self.input.corrupt(format!("{} pointer delta {} overflows", what, delta)))
    }

    fn compare_raw(&self, field_a: u32, text_a: &[u8], field_b: u32, text_b: &[u8]) -> Ordering {
        let name = |f: u32| self.field_infos.name(f).unwrap_or("");
        match (field_a == NO_FIELD, field_b == NO_FIELD) {
            (true, true) => return text_a.cmp(text_b),
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        compare_utf8_as_utf16(name(field_a).as_bytes(), name(field_b).as_bytes())
            .then_with(|| compare_utf8_as_utf16(text_a, text_b))
    }

    /// Current term; None before the first entry, at the leading empty index
    /// entry and once exhausted
    pub fn term(&self) -> Option<Term> {
        if self.exhausted || self.position < 0 || self.field == NO_FIELD {
            return None;
        }
        let field = self.field_infos.name(self.field)?;
        Some(Term::new(field, String::from_utf8_lossy(&self.text)))
    }

    pub fn field_number(&self) -> Option<u32> {
        if self.exhausted || self.field == NO_FIELD { None } else { Some(self.field) }
    }

    pub fn term_bytes(&self) -> &[u8] {
        &self.text
    }

    pub fn term_info(&self) -> TermInfo {
        self.term_info
    }

    /// Absolute `.tis` offset following the current entry (index files only)
    pub fn index_pointer(&self) -> u64 {
        self.index_pointer
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Compare the current term with `target`; the position before the first
    /// term sorts low and an exhausted enum sorts high
    pub fn compare_current(&self, target: &Term) -> Ordering {
        if self.exhausted {
            return Ordering::Greater;
        }
        if self.position < 0 || self.field == NO_FIELD {
            return Ordering::Less;
        }
        let name = self.field_infos.name(self.field).unwrap_or("");
        compare_utf8_as_utf16(name.as_bytes(), target.field.as_bytes())
            .then_with(|| compare_utf8_as_utf16(&self.text, target.text.as_bytes()))
    }

    /// Reposition at an entry described by the term index: the enum behaves
    /// as if it had just decoded `(field, text, term_info)` at `position`
    /// and `pointer` is where the next entry starts
    pub fn seek(&mut self, pointer: u64, position: i64, field: u32, text: &[u8], term_info: TermInfo) -> Result<()> {
        self.input.seek(pointer)?;
        self.position = position;
        self.field = field;
        self.text.clear();
        self.text.extend_from_slice(text);
        self.term_info = term_info;
        self.exhausted = false;
        Ok(())
    }

    /// Advance until the current term is >= `target` or the enum is exhausted
    pub fn scan_to(&mut self, target: &Term) -> Result<()> {
        while self.compare_current(target) == Ordering::Less {
            if !self.next()? {
                break;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SegmentTermEnum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SegmentTermEnum({:?}, position={}/{}, index={})",
            self.input, self.position, self.size, self.is_index
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn field_infos() -> Arc<FieldInfos> {
        let mut infos = FieldInfos::new();
        infos.add("f", true, false, false);
        Arc::new(infos)
    }

    /// Three terms of field 0 with the given freq pointer delta each
    fn term_file(params: &FormatParams, freq_delta: u64) -> IndexInput {
        let mut out = IndexOutput::new("_0.tis");
        params.write_header(&mut out, TERMS_CODEC);
        out.write_long(3);
        out.write_int(params.term_index_interval as i32);
        out.write_int(params.skip_interval as i32);
        out.write_int(params.max_skip_levels as i32);
        for text in ["a", "b", "c"] {
            out.write_vint(0);
            out.write_vint(1);
            out.write_bytes(text.as_bytes());
            out.write_vint(0);
            out.write_vint(1);
            out.write_vlong(freq_delta);
            out.write_vlong(0);
        }
        params.write_trailer(&mut out);
        IndexInput::new("_0.tis", Bytes::from(out.into_bytes()))
    }

    #[test]
    fn decodes_prefix_coded_entries() {
        let params = FormatParams::for_generation(Generation::V4);
        let mut terms = SegmentTermEnum::open(term_file(&params, 10), field_infos(), &params, false).unwrap();
        assert_eq!(terms.size(), 3);
        let mut seen = Vec::new();
        while terms.next().unwrap() {
            seen.push((terms.term().unwrap().text, terms.term_info().freq_pointer));
        }
        assert_eq!(seen, vec![("a".to_string(), 10), ("b".to_string(), 20), ("c".to_string(), 30)]);
        assert!(terms.is_exhausted());
    }

    #[test]
    fn overflowing_pointer_deltas_are_corruption() {
        let params = FormatParams::for_generation(Generation::V4);
        let mut terms =
            SegmentTermEnum::open(term_file(&params, 0x7fff_ffff_ffff_ffff), field_infos(), &params, false).unwrap();
        assert!(terms.next().unwrap());
        assert!(terms.next().unwrap());
        let err = terms.next().unwrap_err();
        assert!(err.is_corruption(), "{}", err);
    }
}
