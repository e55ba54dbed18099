use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use crate::codec::FormatParams;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document, FieldValue, Position, Posting};
use crate::index::commit::{SegmentInfo, SegmentInfos};
use crate::index::field_infos::FieldInfos;
use crate::index::generation::Generation;
use crate::index::segment_writer::{SegmentWriter, write_deleted_docs};
use crate::index::stored_fields::StoredDocument;
use crate::index::term::Term;
use crate::store::directory::Directory;
use crate::util::bit_vector::BitVector;

/// Inverts whole documents in memory and writes them as one segment.
///
/// Text is split on whitespace; the n-th token of a field gets position n.
/// Used to produce indexes in any generation's layout.
pub struct SegmentBuilder {
    params: FormatParams,
    field_infos: FieldInfos,
    postings: BTreeMap<Term, Vec<Posting>>,
    stored: Vec<StoredDocument>,
    deleted: Vec<DocId>,
}

impl SegmentBuilder {
    pub fn new(generation: Generation) -> Self {
        SegmentBuilder {
            params: FormatParams::for_generation(generation),
            field_infos: FieldInfos::new(),
            postings: BTreeMap::new(),
            stored: Vec::new(),
            deleted: Vec::new(),
        }
    }

    pub fn max_doc(&self) -> u32 {
        self.stored.len() as u32
    }

    pub fn add_document(&mut self, doc: &Document) -> Result<DocId> {
        let doc_id = self.stored.len() as DocId;
        let mut stored = Vec::new();
        let mut terms: HashMap<Term, Vec<Position>> = HashMap::new();
        let mut freqs: HashMap<Term, u32> = HashMap::new();
        let mut next_position: HashMap<&str, u32> = HashMap::new();

        for (name, value) in &doc.fields {
            match value {
                FieldValue::Text(text) => {
                    self.field_infos.add(name, true, false, false);
                    let pos = next_position.entry(name.as_str()).or_insert(0);
                    for token in text.split_whitespace() {
                        terms.entry(Term::new(name.as_str(), token)).or_default().push(Position::new(*pos));
                        *pos += 1;
                    }
                }
                FieldValue::TextWithPayloads(tokens) => {
                    self.field_infos.add(name, true, true, false);
                    let pos = next_position.entry(name.as_str()).or_insert(0);
                    for (token, payload) in tokens {
                        let position = if payload.is_empty() {
                            Position::new(*pos)
                        } else {
                            Position::with_payload(*pos, payload.clone())
                        };
                        terms.entry(Term::new(name.as_str(), token.as_str())).or_default().push(position);
                        *pos += 1;
                    }
                }
                FieldValue::Keywords(text) => {
                    self.field_infos.add(name, true, false, true);
                    for token in text.split_whitespace() {
                        *freqs.entry(Term::new(name.as_str(), token)).or_insert(0) += 1;
                    }
                }
                FieldValue::Stored(bytes) => {
                    let number = self.field_infos.add(name, false, false, false);
                    stored.push((number, bytes.clone()));
                }
            }
        }

        for (term, positions) in terms {
            self.postings.entry(term).or_default().push(Posting::new(doc_id, positions));
        }
        for (term, freq) in freqs {
            let list = self.postings.entry(term).or_default();
            // a token seen both as text and keyword in one doc
            match list.last_mut() {
                Some(last) if last.doc_id == doc_id => last.freq += freq,
                _ => list.push(Posting { doc_id, freq, positions: Vec::new() }),
            }
        }
        self.stored.push(stored);
        Ok(doc_id)
    }

    pub fn delete_document(&mut self, doc: DocId) -> Result<()> {
        if doc as usize >= self.stored.len() {
            return Err(Error::invalid_argument(format!("doc {} out of range {}", doc, self.stored.len())));
        }
        if !self.deleted.contains(&doc) {
            self.deleted.push(doc);
        }
        Ok(())
    }

    /// Write the segment as `name`
    pub fn build(self, dir: &dyn Directory, name: &str) -> Result<SegmentInfo> {
        let field_infos = Arc::new(self.field_infos);
        let mut writer = SegmentWriter::new(name, field_infos.clone(), self.params);

        for (term, list) in &self.postings {
            let field = field_infos
                .by_name(&term.field)
                .ok_or_else(|| Error::invalid_state(format!("field {} vanished", term.field)))?;
            writer.start_term(field.number, &term.text)?;
            for posting in list {
                writer.add_doc(posting.doc_id, posting.freq)?;
                if !field.omit_positions {
                    for position in &posting.positions {
                        writer.add_position(position)?;
                    }
                }
            }
            writer.finish_term()?;
        }
        for doc in &self.stored {
            writer.add_document(doc.iter().map(|(number, value)| (*number, value.as_slice())))?;
        }

        let max_doc = self.stored.len() as u32;
        let mut info = writer.finish(dir, max_doc)?;
        if !self.deleted.is_empty() {
            let mut bits = BitVector::new(max_doc as usize);
            for &doc in &self.deleted {
                bits.set(doc as usize);
            }
            write_deleted_docs(dir, &mut info, &bits, &self.params)?;
        }
        Ok(info)
    }

    /// Write the segment under a fresh name from `infos` and append it
    pub fn add_to(self, dir: &dyn Directory, infos: &mut SegmentInfos) -> Result<SegmentInfo> {
        if self.params.generation != infos.format {
            return Err(Error::invalid_argument(format!(
                "{} segment cannot join a {} commit",
                self.params.generation, infos.format
            )));
        }
        let name = infos.new_segment_name();
        let info = self.build(dir, &name)?;
        infos.segments.push(info.clone());
        Ok(info)
    }
}
