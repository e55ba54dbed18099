use crate::codec::FormatParams;
use crate::core::error::{Error, Result};
use crate::core::types::DocId;
use crate::index::file_names::{FIELDS_EXTENSION, FIELDS_INDEX_EXTENSION, segment_file_name};
use crate::store::data_input::IndexInput;
use crate::store::data_output::IndexOutput;
use crate::store::directory::Directory;

pub const FIELDS_INDEX_CODEC: &str = "StoredFieldsIndex";
pub const FIELDS_CODEC: &str = "StoredFieldsData";

/// Stored values of one document: (field number, bytes)
pub type StoredDocument = Vec<(u32, Vec<u8>)>;

/// Writes `.fdx` (one long pointer per doc) and `.fdt` (per doc: vint field
/// count, then vint field number and length-prefixed bytes per value)
pub struct StoredFieldsWriter {
    index: IndexOutput,
    data: IndexOutput,
    params: FormatParams,
    doc_count: u32,
}

impl StoredFieldsWriter {
    pub fn new(segment: &str, params: FormatParams) -> Self {
        let mut index = IndexOutput::new(segment_file_name(segment, FIELDS_INDEX_EXTENSION));
        let mut data = IndexOutput::new(segment_file_name(segment, FIELDS_EXTENSION));
        params.write_header(&mut index, FIELDS_INDEX_CODEC);
        params.write_header(&mut data, FIELDS_CODEC);
        StoredFieldsWriter { index, data, params, doc_count: 0 }
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn add_document<'a, I>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (u32, &'a [u8])>,
        I::IntoIter: ExactSizeIterator,
    {
        let fields = fields.into_iter();
        self.index.write_long(self.data.position() as i64);
        self.data.write_vint(fields.len() as u32);
        for (number, value) in fields {
            self.data.write_vint(number);
            self.data.write_vint(value.len() as u32);
            self.data.write_bytes(value);
        }
        self.doc_count += 1;
        Ok(())
    }

    pub fn finish(mut self, dir: &dyn Directory) -> Result<Vec<String>> {
        let names = vec![self.index.name.clone(), self.data.name.clone()];
        self.params.write_trailer(&mut self.index);
        self.params.write_trailer(&mut self.data);
        self.index.finish(dir)?;
        self.data.finish(dir)?;
        Ok(names)
    }
}

pub struct StoredFieldsReader {
    index: IndexInput,
    data: IndexInput,
    index_start: u64,
    data_end: u64,
    max_doc: u32,
}

impl StoredFieldsReader {
    pub fn open(dir: &dyn Directory, segment: &str, params: &FormatParams, max_doc: u32) -> Result<Self> {
        let mut index = dir.open_input(&segment_file_name(segment, FIELDS_INDEX_EXTENSION))?;
        let mut data = dir.open_input(&segment_file_name(segment, FIELDS_EXTENSION))?;
        let index_end = params.check_trailer(&mut index)?;
        let data_end = params.check_trailer(&mut data)?;
        params.check_header(&mut index, FIELDS_INDEX_CODEC)?;
        params.check_header(&mut data, FIELDS_CODEC)?;

        let index_start = index.position();
        let expected = index_start + max_doc as u64 * 8;
        if index_end != expected {
            return Err(Error::corrupt(
                index.name(),
                index_end,
                format!("stored fields index holds {} bytes of pointers, expected {} docs", index_end - index_start, max_doc),
            ));
        }
        Ok(StoredFieldsReader { index, data, index_start, data_end, max_doc })
    }

    pub fn document(&self, doc: DocId) -> Result<StoredDocument> {
        if doc >= self.max_doc {
            return Err(Error::invalid_argument(format!("doc {} out of range {}", doc, self.max_doc)));
        }
        let mut index = self.index.clone();
        index.seek(self.index_start + doc as u64 * 8)?;
        let pointer = index.read_long()?;
        if pointer < 0 || pointer as u64 >= self.data_end {
            return Err(index.corrupt(format!("stored fields pointer {} out of range", pointer)));
        }

        let mut data = self.data.clone();
        data.seek(pointer as u64)?;
        let count = data.read_vint()?;
        let mut fields = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let number = data.read_vint()?;
            let len = data.read_vint()? as usize;
            fields.push((number, data.read_bytes(len)?.to_vec()));
        }
        if data.position() > self.data_end {
            return Err(data.corrupt("stored document runs past end of data"));
        }
        Ok(fields)
    }
}
