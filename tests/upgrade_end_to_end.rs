use std::collections::BTreeMap;
use std::sync::Arc;
use index_upgrader::codec::codec_for;
use index_upgrader::core::types::{Document, FieldValue, Posting};
use index_upgrader::index::builder::SegmentBuilder;
use index_upgrader::index::detector;
use index_upgrader::index::file_names::is_index_file;
use index_upgrader::index::{SegmentInfos, SegmentReader, Term};
use index_upgrader::store::{Directory, FsDirectory};
use index_upgrader::{ErrorKind, Generation, IndexUpgrader, UpgradeConfig};
use tempfile::TempDir;

const DOCS_PER_SEGMENT: u32 = 300;

fn document(segment: u32, i: u32) -> Document {
    let mut body = format!("all seg{} mod{} mod{}", segment, i % 7, i % 3);
    if i % 50 == 0 {
        body.push_str(" rare");
    }
    Document::new()
        .with_field("id", FieldValue::Stored(format!("{}:{}", segment, i).into_bytes()))
        .with_field("body", FieldValue::Text(body))
        .with_field("tag", FieldValue::Keywords(format!("t{} t{}", i % 4, i % 4)))
        .with_field(
            "pay",
            FieldValue::TextWithPayloads(vec![("p".to_string(), vec![(i % 256) as u8]), ("p".to_string(), vec![])]),
        )
}

/// One full segment and one with every other document deleted
fn build_index(dir: &FsDirectory, generation: Generation) -> SegmentInfos {
    let mut infos = SegmentInfos::new(generation);
    for segment in 0..2 {
        let mut builder = SegmentBuilder::new(generation);
        for i in 0..DOCS_PER_SEGMENT {
            builder.add_document(&document(segment, i)).unwrap();
        }
        if segment == 1 {
            for doc in (0..DOCS_PER_SEGMENT).step_by(2) {
                builder.delete_document(doc).unwrap();
            }
        }
        builder.add_to(dir, &mut infos).unwrap();
    }
    codec_for(generation).write_commit(dir, &mut infos).unwrap();
    infos
}

/// Live postings of every term, renumbered as a merge in commit order would
fn live_postings(readers: &[SegmentReader]) -> BTreeMap<Term, Vec<Posting>> {
    let mut all: BTreeMap<Term, Vec<Posting>> = BTreeMap::new();
    let mut base = 0;
    for reader in readers {
        let mut new_ids = Vec::new();
        let mut next = base;
        for doc in 0..reader.max_doc() {
            if reader.is_deleted(doc) {
                new_ids.push(None);
            } else {
                new_ids.push(Some(next));
                next += 1;
            }
        }
        let mut terms = reader.terms();
        while terms.next().unwrap() {
            let term = terms.term().unwrap();
            let field = terms.field_number().unwrap();
            let mut postings = reader.postings(field, terms.term_info()).unwrap();
            for mut posting in postings.read_all().unwrap() {
                if let Some(new_id) = new_ids[posting.doc_id as usize] {
                    posting.doc_id = new_id;
                    all.entry(term.clone()).or_default().push(posting);
                }
            }
        }
        base = next;
    }
    all
}

fn open_all(dir: &FsDirectory, infos: &SegmentInfos) -> Vec<SegmentReader> {
    codec_for(infos.format).open_segments(dir, infos, &UpgradeConfig::default()).unwrap()
}

#[test]
fn one_hop_merges_live_docs_into_one_segment() {
    for generation in [Generation::V2, Generation::V3, Generation::V4] {
        let tmp = TempDir::new().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();
        let source = build_index(&dir, generation);
        let expected = live_postings(&open_all(&dir, &source));

        let next = generation.next().unwrap();
        let mut upgrader = IndexUpgrader::new(Arc::new(dir.clone()), UpgradeConfig::default()).with_target(next);
        assert_eq!(upgrader.run().unwrap(), next);

        let infos = SegmentInfos::read_latest(&dir).unwrap();
        assert_eq!(infos.format, next);
        assert_eq!(infos.generation, source.generation + 1);
        assert_eq!(infos.segments.len(), 1);
        assert_eq!(infos.segments[0].max_doc, DOCS_PER_SEGMENT + DOCS_PER_SEGMENT / 2);
        assert!(!infos.segments[0].has_deletions());

        let readers = open_all(&dir, &infos);
        let actual = live_postings(&readers);
        assert_eq!(actual.len(), expected.len());
        for (term, postings) in &expected {
            assert_eq!(actual.get(term), Some(postings), "postings of {} differ", term);
            let info = readers[0].term_infos().get(term).unwrap().unwrap();
            assert_eq!(info.doc_freq as usize, postings.len());
        }

        let id = readers[0].field_infos().by_name("id").unwrap().number;
        assert_eq!(readers[0].document(DOCS_PER_SEGMENT).unwrap(), vec![(id, b"1:1".to_vec())]);
        assert_eq!(detector::detect(&dir).unwrap(), next);
        assert!(!dir.list_all().unwrap().iter().any(|f| *f == source.segments_file_name()));
    }
}

#[test]
fn full_upgrade_reaches_terminal_generation() {
    let tmp = TempDir::new().unwrap();
    let dir = FsDirectory::open(tmp.path()).unwrap();
    let source = build_index(&dir, Generation::V2);
    let expected = live_postings(&open_all(&dir, &source));

    assert_eq!(index_upgrader::upgrade(tmp.path()).unwrap(), Generation::V5);
    assert_eq!(index_upgrader::detect(tmp.path()).unwrap(), Generation::V5);

    let infos = SegmentInfos::read_latest(&dir).unwrap();
    assert_eq!(infos.generation, source.generation + 3);
    assert!(infos.segments[0].id.is_some());
    assert!(infos.user_data.contains_key("upgraded_at"));
    assert_eq!(live_postings(&open_all(&dir, &infos)), expected);

    let mut left: Vec<String> = dir.list_all().unwrap().into_iter().filter(|f| is_index_file(f)).collect();
    left.sort();
    let mut referenced = infos.files(true);
    referenced.sort();
    assert_eq!(left, referenced);

    // a second run has nothing to do
    assert_eq!(index_upgrader::upgrade(tmp.path()).unwrap(), Generation::V5);
    assert_eq!(SegmentInfos::read_latest(&dir).unwrap().generation, infos.generation);
}

#[test]
fn upgrade_refuses_a_locked_directory() {
    let tmp = TempDir::new().unwrap();
    let dir = FsDirectory::open(tmp.path()).unwrap();
    build_index(&dir, Generation::V4);
    let _lock = dir.obtain_lock("write.lock").unwrap();

    let err = index_upgrader::upgrade(tmp.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LockObtainFailed);
    assert_eq!(index_upgrader::detect(tmp.path()).unwrap(), Generation::V4);
}

#[test]
fn missing_directory_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = index_upgrader::detect(tmp.path().join("nope")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
