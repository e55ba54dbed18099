use std::sync::Arc;
use log::debug;
use crate::codec::FormatParams;
use crate::core::config::UpgradeConfig;
use crate::core::error::{Error, Result};
use crate::core::types::DocId;
use crate::index::commit::SegmentInfo;
use crate::index::field_infos::FieldInfos;
use crate::index::file_names::{FIELD_INFOS_EXTENSION, FREQ_EXTENSION, PROX_EXTENSION, segment_file_name};
use crate::index::postings::SegmentPostings;
use crate::index::postings_writer::{FREQ_CODEC, PROX_CODEC};
use crate::index::segment_writer::DELETES_CODEC;
use crate::index::stored_fields::{StoredDocument, StoredFieldsReader};
use crate::index::term::{Term, TermInfo};
use crate::index::term_enum::SegmentTermEnum;
use crate::index::term_infos_reader::TermInfosReader;
use crate::store::data_input::IndexInput;
use crate::store::directory::Directory;
use crate::util::bit_vector::BitVector;

/// Read access to every file of one segment
pub struct SegmentReader {
    info: SegmentInfo,
    params: FormatParams,
    config: UpgradeConfig,
    field_infos: Arc<FieldInfos>,
    terms: TermInfosReader,
    freq_in: IndexInput,
    prox_in: IndexInput,
    stored: StoredFieldsReader,
    deleted: Option<BitVector>,
}

impl SegmentReader {
    pub fn open(dir: &dyn Directory, info: &SegmentInfo, params: FormatParams, config: &UpgradeConfig) -> Result<Self> {
        let segment = info.name.as_str();
        let field_infos = Arc::new(FieldInfos::read(
            dir,
            &segment_file_name(segment, FIELD_INFOS_EXTENSION),
            &params,
        )?);
        let terms = TermInfosReader::open(dir, segment, field_infos.clone(), &params, config)?;
        let freq_in = open_postings_file(dir, &segment_file_name(segment, FREQ_EXTENSION), &params, FREQ_CODEC)?;
        let prox_in = open_postings_file(dir, &segment_file_name(segment, PROX_EXTENSION), &params, PROX_CODEC)?;
        let stored = StoredFieldsReader::open(dir, segment, &params, info.max_doc)?;

        let deleted = if info.has_deletions() {
            let mut input = dir.open_input(&info.deletes_file_name())?;
            params.check_trailer(&mut input)?;
            params.check_header(&mut input, DELETES_CODEC)?;
            let bits = BitVector::read(&mut input)?;
            if bits.size() != info.max_doc as usize || bits.count() != info.del_count as usize {
                return Err(input.corrupt(format!(
                    "deleted docs ({} of {}) disagree with segment info ({} of {})",
                    bits.count(),
                    bits.size(),
                    info.del_count,
                    info.max_doc
                )));
            }
            Some(bits)
        } else {
            None
        };

        debug!(
            "opened segment {} ({}): {} docs, {} deleted, {} terms",
            segment,
            params.generation,
            info.max_doc,
            info.del_count,
            terms.size()
        );
        Ok(SegmentReader {
            info: info.clone(),
            params,
            config: config.clone(),
            field_infos,
            terms,
            freq_in,
            prox_in,
            stored,
            deleted,
        })
    }

    pub fn info(&self) -> &SegmentInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn params(&self) -> &FormatParams {
        &self.params
    }

    pub fn max_doc(&self) -> u32 {
        self.info.max_doc
    }

    pub fn num_docs(&self) -> u32 {
        self.info.num_docs()
    }

    pub fn is_deleted(&self, doc: DocId) -> bool {
        self.deleted.as_ref().is_some_and(|bits| bits.get(doc as usize))
    }

    pub fn field_infos(&self) -> &Arc<FieldInfos> {
        &self.field_infos
    }

    pub fn term_infos(&self) -> &TermInfosReader {
        &self.terms
    }

    /// Enum over every term, positioned before the first
    pub fn terms(&self) -> SegmentTermEnum {
        self.terms.terms()
    }

    /// Postings of the term described by `info` in field `field`
    pub fn postings(&self, field: u32, info: TermInfo) -> Result<SegmentPostings> {
        let field_info = self
            .field_infos
            .get(field)
            .ok_or_else(|| Error::invalid_argument(format!("unknown field number {}", field)))?;
        SegmentPostings::new(
            self.freq_in.clone(),
            self.prox_in.clone(),
            field_info,
            info,
            self.params,
            &self.config,
        )
    }

    /// Postings of `term`, None when the segment does not contain it
    pub fn term_postings(&self, term: &Term) -> Result<Option<SegmentPostings>> {
        let Some(field) = self.field_infos.by_name(&term.field) else {
            return Ok(None);
        };
        match self.terms.get(term)? {
            Some(info) => Ok(Some(self.postings(field.number, info)?)),
            None => Ok(None),
        }
    }

    pub fn document(&self, doc: DocId) -> Result<StoredDocument> {
        self.stored.document(doc)
    }
}

fn open_postings_file(dir: &dyn Directory, name: &str, params: &FormatParams, codec: &str) -> Result<IndexInput> {
    let mut input = dir.open_input(name)?;
    params.check_trailer(&mut input)?;
    params.check_header(&mut input, codec)?;
    Ok(input)
}
