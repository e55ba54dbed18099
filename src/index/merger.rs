use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use log::{debug, info};
use crate::codec::FormatParams;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocId;
use crate::index::commit::SegmentInfo;
use crate::index::field_infos::FieldInfos;
use crate::index::segment_reader::SegmentReader;
use crate::index::segment_writer::SegmentWriter;
use crate::index::term::Term;
use crate::index::term_enum::SegmentTermEnum;
use crate::packed::{Mutable, Reader, bits_required, get_mutable};
use crate::store::directory::Directory;

/// Cancellation flag shared between a running merge and its owner
#[derive(Debug, Clone, Default)]
pub struct MergeAbort(Arc<AtomicBool>);

impl MergeAbort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }

    pub fn check(&self, segment: &str) -> Result<()> {
        if self.is_aborted() {
            return Err(Error::new(ErrorKind::Aborted, format!("merge into {} aborted", segment)));
        }
        Ok(())
    }
}

/// Maps one source segment's doc ids onto the merged segment
struct DocMap {
    base: DocId,
    max_doc: DocId,
    /// new doc + 1 per old doc, 0 for deleted docs; None without deletions
    remap: Option<Box<dyn Mutable>>,
}

impl DocMap {
    fn build(reader: &SegmentReader, base: DocId) -> Result<Self> {
        let max_doc = reader.max_doc();
        if reader.num_docs() == max_doc {
            return Ok(DocMap { base, max_doc, remap: None });
        }
        let mut remap = get_mutable(max_doc as usize, bits_required(reader.num_docs() as u64))?;
        let mut next = 0u64;
        for doc in 0..max_doc {
            if !reader.is_deleted(doc) {
                next += 1;
                remap.set(doc as usize, next)?;
            }
        }
        Ok(DocMap { base, max_doc, remap: Some(remap) })
    }

    fn get(&self, doc: DocId) -> Option<DocId> {
        if doc >= self.max_doc {
            return None;
        }
        match &self.remap {
            None => Some(self.base + doc),
            Some(remap) => match remap.get(doc as usize) {
                0 => None,
                n => Some(self.base + n as DocId - 1),
            },
        }
    }
}

/// Term enum of one source segment inside the merge queue
struct MergeCursor {
    term: Term,
    index: usize,
    terms: SegmentTermEnum,
}

impl PartialEq for MergeCursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeCursor {}

impl PartialOrd for MergeCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.term.cmp(&other.term).then(self.index.cmp(&other.index))
    }
}

/// Merges several segments, possibly of different generations, into one
/// segment written with `params`. Deleted documents are dropped and the
/// survivors renumbered densely in source order.
pub struct SegmentMerger<'a> {
    readers: &'a [SegmentReader],
    params: FormatParams,
    abort: MergeAbort,
}

impl<'a> SegmentMerger<'a> {
    pub fn new(readers: &'a [SegmentReader], params: FormatParams, abort: MergeAbort) -> Self {
        SegmentMerger { readers, params, abort }
    }

    pub fn merge(&self, dir: &dyn Directory, segment: &str) -> Result<SegmentInfo> {
        let mut field_infos = FieldInfos::new();
        for reader in self.readers {
            field_infos.add_all(reader.field_infos());
        }
        let field_infos = Arc::new(field_infos);

        let mut doc_maps = Vec::with_capacity(self.readers.len());
        let mut base = 0u32;
        for reader in self.readers {
            doc_maps.push(DocMap::build(reader, base)?);
            base = base
                .checked_add(reader.num_docs())
                .ok_or_else(|| Error::invalid_argument("merged segment would exceed the doc id space"))?;
        }
        let max_doc = base;

        info!(
            "merging {} segments ({} live docs) into {} as {}",
            self.readers.len(),
            max_doc,
            segment,
            self.params.generation
        );
        let mut writer = SegmentWriter::new(segment, field_infos.clone(), self.params);
        self.merge_stored_fields(&mut writer, &field_infos, segment)?;
        let term_count = self.merge_terms(&mut writer, &field_infos, &doc_maps, segment)?;
        let info = writer.finish(dir, max_doc)?;
        debug!("merged {} terms into {}", term_count, segment);
        Ok(info)
    }

    fn merge_stored_fields(&self, writer: &mut SegmentWriter, field_infos: &FieldInfos, segment: &str) -> Result<()> {
        for reader in self.readers {
            let numbers = field_number_map(reader.field_infos(), field_infos)?;
            for doc in 0..reader.max_doc() {
                if reader.is_deleted(doc) {
                    continue;
                }
                self.abort.check(segment)?;
                let fields = reader.document(doc)?;
                let mut remapped = Vec::with_capacity(fields.len());
                for (number, value) in &fields {
                    let new_number = numbers.get(*number as usize).copied().ok_or_else(|| {
                        Error::corrupt(reader.name(), doc as u64, format!("stored field number {} unknown", number))
                    })?;
                    remapped.push((new_number, value.as_slice()));
                }
                writer.add_document(remapped)?;
            }
        }
        Ok(())
    }

    fn merge_terms(
        &self,
        writer: &mut SegmentWriter,
        field_infos: &FieldInfos,
        doc_maps: &[DocMap],
        segment: &str,
    ) -> Result<u64> {
        let mut queue = BinaryHeap::new();
        for (index, reader) in self.readers.iter().enumerate() {
            let mut terms = reader.terms();
            if let Some(term) = next_term(&mut terms)? {
                queue.push(Reverse(MergeCursor { term, index, terms }));
            }
        }

        let mut term_count = 0u64;
        let mut matching: Vec<MergeCursor> = Vec::with_capacity(self.readers.len());
        while let Some(Reverse(top)) = queue.pop() {
            matching.clear();
            matching.push(top);
            while queue.peek().is_some_and(|Reverse(c)| c.term == matching[0].term) {
                if let Some(Reverse(cursor)) = queue.pop() {
                    matching.push(cursor);
                }
            }
            self.abort.check(segment)?;

            if self.append_postings(writer, field_infos, doc_maps, &matching)? {
                term_count += 1;
            }

            for mut cursor in matching.drain(..) {
                if let Some(term) = next_term(&mut cursor.terms)? {
                    cursor.term = term;
                    queue.push(Reverse(cursor));
                }
            }
        }
        Ok(term_count)
    }

    /// Write the live postings of one term; false when every doc was deleted
    fn append_postings(
        &self,
        writer: &mut SegmentWriter,
        field_infos: &FieldInfos,
        doc_maps: &[DocMap],
        matching: &[MergeCursor],
    ) -> Result<bool> {
        let term = &matching[0].term;
        let field = field_infos
            .by_name(&term.field)
            .ok_or_else(|| Error::invalid_state(format!("field {} missing from merged field infos", term.field)))?;
        let mut started = false;

        for cursor in matching {
            let reader = &self.readers[cursor.index];
            let doc_map = &doc_maps[cursor.index];
            let old_field = cursor
                .terms
                .field_number()
                .ok_or_else(|| Error::invalid_state("term cursor without field"))?;
            let mut postings = reader.postings(old_field, cursor.terms.term_info())?;
            while let Some(doc) = postings.next()? {
                let Some(new_doc) = doc_map.get(doc) else {
                    if doc >= reader.max_doc() {
                        return Err(Error::corrupt(
                            reader.name(),
                            doc as u64,
                            format!("posting of {} references doc {} past max doc {}", term, doc, reader.max_doc()),
                        ));
                    }
                    continue;
                };
                if !started {
                    writer.start_term(field.number, &term.text)?;
                    started = true;
                }
                writer.add_doc(new_doc, postings.freq())?;
                if !field.omit_positions {
                    for position in postings.positions()? {
                        writer.add_position(position)?;
                    }
                }
            }
        }

        if started {
            writer.finish_term()?;
        }
        Ok(started)
    }
}

fn next_term(terms: &mut SegmentTermEnum) -> Result<Option<Term>> {
    if terms.next()? {
        match terms.term() {
            Some(term) => Ok(Some(term)),
            None => Err(Error::invalid_state(format!("{:?} yielded no term", terms))),
        }
    } else {
        Ok(None)
    }
}

/// Old field number to merged field number
fn field_number_map(old: &FieldInfos, merged: &FieldInfos) -> Result<Vec<u32>> {
    old.iter()
        .map(|info| {
            merged
                .by_name(&info.name)
                .map(|f| f.number)
                .ok_or_else(|| Error::invalid_state(format!("field {} missing from merged field infos", info.name)))
        })
        .collect()
}
