use std::sync::Arc;
use log::debug;
use crate::codec::FormatParams;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Position};
use crate::index::commit::SegmentInfo;
use crate::index::field_infos::FieldInfos;
use crate::index::file_names::{DELETES_EXTENSION, FIELD_INFOS_EXTENSION, segment_file_name};
use crate::index::postings_writer::PostingsWriter;
use crate::index::stored_fields::StoredFieldsWriter;
use crate::index::term_infos_writer::TermInfosWriter;
use crate::store::data_output::IndexOutput;
use crate::store::directory::Directory;
use crate::util::bit_vector::BitVector;

pub const DELETES_CODEC: &str = "DeletedDocs";

/// Streams one segment to disk in a given generation's layout.
///
/// Terms arrive in dictionary order; each is opened with `start_term`, fed
/// docs and positions, and closed with `finish_term`. Stored documents are
/// added in doc id order, independently of the terms.
pub struct SegmentWriter {
    segment: String,
    params: FormatParams,
    field_infos: Arc<FieldInfos>,
    terms: TermInfosWriter,
    postings: PostingsWriter,
    stored: StoredFieldsWriter,
    current_term: Option<(u32, String)>,
}

impl SegmentWriter {
    pub fn new(segment: &str, field_infos: Arc<FieldInfos>, params: FormatParams) -> Self {
        SegmentWriter {
            segment: segment.to_string(),
            params,
            terms: TermInfosWriter::new(segment, field_infos.clone(), params),
            postings: PostingsWriter::new(segment, params),
            stored: StoredFieldsWriter::new(segment, params),
            field_infos,
            current_term: None,
        }
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn params(&self) -> &FormatParams {
        &self.params
    }

    pub fn field_infos(&self) -> &Arc<FieldInfos> {
        &self.field_infos
    }

    pub fn start_term(&mut self, field: u32, text: &str) -> Result<()> {
        let info = self
            .field_infos
            .get(field)
            .ok_or_else(|| Error::invalid_argument(format!("unknown field number {}", field)))?;
        if !info.indexed {
            return Err(Error::invalid_argument(format!("field {} is not indexed", info.name)));
        }
        self.postings.start_term(info)?;
        self.current_term = Some((field, text.to_string()));
        Ok(())
    }

    pub fn add_doc(&mut self, doc: DocId, freq: u32) -> Result<()> {
        self.postings.add_doc(doc, freq)
    }

    pub fn add_position(&mut self, position: &Position) -> Result<()> {
        self.postings.add_position(position)
    }

    pub fn finish_term(&mut self) -> Result<()> {
        let (field, text) = self
            .current_term
            .take()
            .ok_or_else(|| Error::invalid_state("finish_term without start_term"))?;
        let info = self.postings.finish_term()?;
        self.terms.add(field, &text, &info)
    }

    pub fn add_document<'a, I>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (u32, &'a [u8])>,
        I::IntoIter: ExactSizeIterator,
    {
        self.stored.add_document(fields)
    }

    /// Flush every file; `max_doc` must match the number of stored documents
    pub fn finish(self, dir: &dyn Directory, max_doc: u32) -> Result<SegmentInfo> {
        if self.current_term.is_some() {
            return Err(Error::invalid_state("last term was not finished"));
        }
        if self.stored.doc_count() != max_doc {
            return Err(Error::invalid_state(format!(
                "segment {} has {} stored documents, expected {}",
                self.segment,
                self.stored.doc_count(),
                max_doc
            )));
        }
        let term_count = self.terms.term_count();
        let fnm = segment_file_name(&self.segment, FIELD_INFOS_EXTENSION);
        self.field_infos.write(dir, &fnm, &self.params)?;
        let mut files = vec![fnm];
        files.extend(self.terms.finish(dir)?);
        files.extend(self.postings.finish(dir)?);
        files.extend(self.stored.finish(dir)?);
        debug!(
            "wrote segment {} ({}): {} docs, {} terms",
            self.segment, self.params.generation, max_doc, term_count
        );
        Ok(SegmentInfo::new(self.segment, max_doc, files))
    }
}

/// Write the deleted docs of `info` and record the file in it
pub fn write_deleted_docs(
    dir: &dyn Directory,
    info: &mut SegmentInfo,
    deleted: &BitVector,
    params: &FormatParams,
) -> Result<()> {
    if deleted.size() != info.max_doc as usize {
        return Err(Error::invalid_argument(format!(
            "deleted docs of {} cover {} docs, segment has {}",
            info.name,
            deleted.size(),
            info.max_doc
        )));
    }
    let name = segment_file_name(&info.name, DELETES_EXTENSION);
    let mut out = IndexOutput::new(name.clone());
    params.write_header(&mut out, DELETES_CODEC);
    deleted.write(&mut out);
    params.write_trailer(&mut out);
    out.finish(dir)?;
    info.del_count = deleted.count() as u32;
    if !info.files.contains(&name) {
        info.files.push(name);
    }
    Ok(())
}
