use std::cmp::Ordering;
use std::sync::Arc;
use crate::codec::FormatParams;
use crate::core::error::{Error, Result};
use crate::index::field_infos::FieldInfos;
use crate::index::file_names::{TERMS_EXTENSION, TERMS_INDEX_EXTENSION, segment_file_name};
use crate::index::term::TermInfo;
use crate::index::term_enum::{NO_FIELD, write_preamble};
use crate::store::data_output::IndexOutput;
use crate::store::directory::Directory;
use crate::util::string_order::compare_utf8_as_utf16;

/// One of the two term files being written
struct TermFile {
    out: IndexOutput,
    is_index: bool,
    size: u64,
    size_pos: u64,
    last_field: u32,
    last_text: Vec<u8>,
    last_info: TermInfo,
    last_index_pointer: u64,
}

impl TermFile {
    fn new(name: String, params: &FormatParams, is_index: bool) -> Self {
        let mut out = IndexOutput::new(name);
        let size_pos = write_preamble(&mut out, params, is_index);
        TermFile {
            out,
            is_index,
            size: 0,
            size_pos,
            last_field: NO_FIELD,
            last_text: Vec::new(),
            last_info: TermInfo::default(),
            last_index_pointer: 0,
        }
    }

    fn write_entry(&mut self, field: u32, text: &[u8], info: &TermInfo, skip_interval: u32, index_pointer: u64) {
        let shared = self
            .last_text
            .iter()
            .zip(text.iter())
            .take_while(|(a, b)| a == b)
            .count();
        self.out.write_vint(shared as u32);
        self.out.write_vint((text.len() - shared) as u32);
        self.out.write_bytes(&text[shared..]);
        self.out.write_vint(field);
        self.out.write_vint(info.doc_freq);
        self.out.write_vlong(info.freq_pointer - self.last_info.freq_pointer);
        self.out.write_vlong(info.prox_pointer - self.last_info.prox_pointer);
        if info.doc_freq > skip_interval {
            self.out.write_vint(info.skip_offset);
        }
        if self.is_index {
            self.out.write_vlong(index_pointer - self.last_index_pointer);
            self.last_index_pointer = index_pointer;
        }
        self.last_field = field;
        self.last_text.clear();
        self.last_text.extend_from_slice(text);
        self.last_info = *info;
        self.size += 1;
    }

    fn finish(mut self, params: &FormatParams, dir: &dyn Directory) -> Result<()> {
        self.out.patch_long(self.size_pos, self.size as i64)?;
        params.write_trailer(&mut self.out);
        self.out.finish(dir)?;
        Ok(())
    }
}

/// Writes a segment's term dictionary (`.tis`) and its sampled index
/// (`.tii`). Terms must arrive in strictly increasing order.
///
/// Every `term_index_interval`-th term boundary adds an index entry holding
/// the term just before the boundary, so a reader seeking through the index
/// resumes prefix and pointer decoding exactly where that term ended.
pub struct TermInfosWriter {
    tis: TermFile,
    tii: TermFile,
    field_infos: Arc<FieldInfos>,
    params: FormatParams,
}

impl TermInfosWriter {
    pub fn new(segment: &str, field_infos: Arc<FieldInfos>, params: FormatParams) -> Self {
        TermInfosWriter {
            tis: TermFile::new(segment_file_name(segment, TERMS_EXTENSION), &params, false),
            tii: TermFile::new(segment_file_name(segment, TERMS_INDEX_EXTENSION), &params, true),
            field_infos,
            params,
        }
    }

    pub fn term_count(&self) -> u64 {
        self.tis.size
    }

    pub fn add(&mut self, field: u32, text: &str, info: &TermInfo) -> Result<()> {
        let name = self
            .field_infos
            .name(field)
            .ok_or_else(|| Error::invalid_argument(format!("unknown field number {}", field)))?;
        if self.tis.size > 0 {
            let last_name = self.field_infos.name(self.tis.last_field).unwrap_or("");
            let order = compare_utf8_as_utf16(name.as_bytes(), last_name.as_bytes())
                .then_with(|| compare_utf8_as_utf16(text.as_bytes(), &self.tis.last_text));
            if order != Ordering::Greater {
                return Err(Error::invalid_argument(format!(
                    "term {}:{} added out of order",
                    name, text
                )));
            }
            if info.freq_pointer < self.tis.last_info.freq_pointer || info.prox_pointer < self.tis.last_info.prox_pointer {
                return Err(Error::invalid_argument(format!("postings pointers of {}:{} go backwards", name, text)));
            }
        }

        if self.tis.size % self.params.term_index_interval as u64 == 0 {
            let index_pointer = self.tis.out.position();
            let (field, text, info) = (self.tis.last_field, self.tis.last_text.clone(), self.tis.last_info);
            self.tii.write_entry(field, &text, &info, self.params.skip_interval, index_pointer);
        }
        self.tis.write_entry(field, text.as_bytes(), info, self.params.skip_interval, 0);
        Ok(())
    }

    /// Write both files; returns their names
    pub fn finish(self, dir: &dyn Directory) -> Result<Vec<String>> {
        let names = vec![self.tis.out.name.clone(), self.tii.out.name.clone()];
        self.tis.finish(&self.params, dir)?;
        self.tii.finish(&self.params, dir)?;
        Ok(names)
    }
}
