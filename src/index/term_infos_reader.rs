use std::num::NonZeroUsize;
use std::sync::Arc;
use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use crate::codec::FormatParams;
use crate::core::config::UpgradeConfig;
use crate::core::error::Result;
use crate::index::field_infos::FieldInfos;
use crate::index::file_names::{TERMS_EXTENSION, TERMS_INDEX_EXTENSION, segment_file_name};
use crate::index::term::{Term, TermInfo};
use crate::index::term_enum::SegmentTermEnum;
use crate::index::term_index::TermIndex;
use crate::store::directory::Directory;

const DEFAULT_CACHE_SIZE: usize = 1024;

/// Random access to a segment's term dictionary.
///
/// Lookups binary search the in-memory `TermIndex`, reposition a clone of
/// the `.tis` enum at the sample and scan forward at most one index interval.
pub struct TermInfosReader {
    segment: String,
    orig_enum: SegmentTermEnum,
    index: TermIndex,
    cache: Mutex<LruCache<Term, TermInfo>>,
}

impl TermInfosReader {
    pub fn open(
        dir: &dyn Directory,
        segment: &str,
        field_infos: Arc<FieldInfos>,
        params: &FormatParams,
        config: &UpgradeConfig,
    ) -> Result<Self> {
        let tis = dir.open_input(&segment_file_name(segment, TERMS_EXTENSION))?;
        let orig_enum = SegmentTermEnum::open(tis, field_infos.clone(), params, false)?;

        let tii_name = segment_file_name(segment, TERMS_INDEX_EXTENSION);
        let tii_len = dir.file_length(&tii_name)?;
        let mut index_enum = SegmentTermEnum::open(dir.open_input(&tii_name)?, field_infos, params, true)?;
        let index = TermIndex::build(&mut index_enum, config.term_index_divisor, tii_len)?;

        let cache_size = NonZeroUsize::new(config.term_cache_size)
            .unwrap_or(NonZeroUsize::MIN.saturating_add(DEFAULT_CACHE_SIZE - 1));
        debug!(
            "{}: {} terms, {} index samples in {} bytes",
            segment,
            orig_enum.size(),
            index.len(),
            index.ram_bytes_used()
        );
        Ok(TermInfosReader {
            segment: segment.to_string(),
            orig_enum,
            index,
            cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Number of terms in the dictionary
    pub fn size(&self) -> u64 {
        self.orig_enum.size()
    }

    pub fn index(&self) -> &TermIndex {
        &self.index
    }

    /// Fresh enum positioned before the first term
    pub fn terms(&self) -> SegmentTermEnum {
        self.orig_enum.clone()
    }

    /// Enum positioned on the first term >= `term` (exhausted if none)
    pub fn terms_from(&self, term: &Term) -> Result<SegmentTermEnum> {
        let mut term_enum = self.orig_enum.clone();
        if let Some(ordinal) = self.index.get_index_offset(term)? {
            self.index.seek_enum(&mut term_enum, ordinal)?;
        }
        term_enum.scan_to(term)?;
        Ok(term_enum)
    }

    /// Dictionary entry of `term`, if present
    pub fn get(&self, term: &Term) -> Result<Option<TermInfo>> {
        if let Some(info) = self.cache.lock().get(term) {
            return Ok(Some(*info));
        }
        let term_enum = self.terms_from(term)?;
        if term_enum.compare_current(term) != std::cmp::Ordering::Equal {
            return Ok(None);
        }
        let info = term_enum.term_info();
        self.cache.lock().put(term.clone(), info);
        Ok(Some(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::generation::Generation;
    use crate::index::term_infos_writer::TermInfosWriter;
    use crate::store::RamDirectory;

    fn build(generation: Generation, terms: &[(&str, String)]) -> (RamDirectory, Arc<FieldInfos>, FormatParams) {
        let dir = RamDirectory::new();
        let params = FormatParams::for_generation(generation);
        let mut infos = FieldInfos::new();
        infos.add("body", true, false, false);
        infos.add("title", true, false, false);
        let infos = Arc::new(infos);
        let mut writer = TermInfosWriter::new("_0", infos.clone(), params);
        for (i, (field, text)) in terms.iter().enumerate() {
            let field = infos.by_name(field).unwrap().number;
            let info = TermInfo {
                doc_freq: (i % 40) as u32 + 1,
                freq_pointer: i as u64 * 10,
                prox_pointer: i as u64 * 20,
                skip_offset: if i % 40 + 1 > 16 { 7 } else { 0 },
            };
            writer.add(field, text, &info).unwrap();
        }
        writer.finish(&dir).unwrap();
        (dir, infos, params)
    }

    fn sorted_terms(n: usize) -> Vec<(&'static str, String)> {
        let mut terms: Vec<Term> = (0..n)
            .map(|i| Term::new(if i % 3 == 0 { "title" } else { "body" }, format!("t{:05}", i)))
            .collect();
        terms.sort();
        terms
            .into_iter()
            .map(|t| (if t.field == "title" { "title" } else { "body" }, t.text))
            .collect()
    }

    #[test]
    fn every_term_is_found_with_its_info() {
        for generation in [Generation::V2, Generation::V5] {
            let terms = sorted_terms(1000);
            let (dir, infos, params) = build(generation, &terms);
            for divisor in [1, 3] {
                let config = UpgradeConfig { term_index_divisor: divisor, term_cache_size: 16, ..UpgradeConfig::default() };
                let reader = TermInfosReader::open(&dir, "_0", infos.clone(), &params, &config).unwrap();
                assert_eq!(reader.size(), 1000);
                for (i, (field, text)) in terms.iter().enumerate() {
                    let info = reader.get(&Term::new(*field, text.clone())).unwrap().unwrap();
                    assert_eq!(info.freq_pointer, i as u64 * 10, "{} {}", field, text);
                    assert_eq!(info.doc_freq, (i % 40) as u32 + 1);
                }
                assert!(reader.get(&Term::new("body", "zzz")).unwrap().is_none());
                assert!(reader.get(&Term::new("aaa", "t00000")).unwrap().is_none());
            }
        }
    }

    #[test]
    fn terms_from_positions_on_ceiling() {
        let terms = sorted_terms(300);
        let (dir, infos, params) = build(Generation::V4, &terms);
        let reader = TermInfosReader::open(&dir, "_0", infos, &params, &UpgradeConfig::default()).unwrap();

        let term_enum = reader.terms_from(&Term::new("body", "t00100x")).unwrap();
        assert_eq!(term_enum.term(), Some(Term::new("body", "t00101")));

        let term_enum = reader.terms_from(&Term::new("title", "zzz")).unwrap();
        assert!(term_enum.term().is_none());

        let mut all = reader.terms();
        let mut count = 0;
        let mut previous: Option<Term> = None;
        while all.next().unwrap() {
            let term = all.term().unwrap();
            if let Some(p) = &previous {
                assert!(p < &term);
            }
            previous = Some(term);
            count += 1;
        }
        assert_eq!(count, 300);
    }

    #[test]
    fn index_binary_search_and_terms() {
        let terms = sorted_terms(200);
        let (dir, infos, params) = build(Generation::V4, &terms);
        let reader = TermInfosReader::open(&dir, "_0", infos, &params, &UpgradeConfig::default()).unwrap();
        let index = reader.index();
        // 200 terms at interval 32 -> samples at boundaries 0, 32, ..., 192
        assert_eq!(index.len(), 7);
        assert_eq!(index.get_term(0).unwrap(), None);
        let (field, text) = &terms[31];
        let sampled = Term::new(*field, text.clone());
        assert_eq!(index.get_term(1).unwrap(), Some(sampled.clone()));
        assert_eq!(index.get_index_offset(&sampled).unwrap(), Some(1));
        assert_eq!(index.compare_to(&sampled, 1).unwrap(), std::cmp::Ordering::Equal);
        let (field, text) = &terms[40];
        assert_eq!(index.get_index_offset(&Term::new(*field, text.clone())).unwrap(), Some(1));
        assert_eq!(index.get_index_offset(&Term::new("", "")).unwrap(), Some(0));
    }

    #[test]
    fn out_of_order_add_is_rejected() {
        let params = FormatParams::for_generation(Generation::V3);
        let mut infos = FieldInfos::new();
        infos.add("body", true, false, false);
        let mut writer = TermInfosWriter::new("_0", Arc::new(infos), params);
        writer.add(0, "b", &TermInfo::default()).unwrap();
        assert!(writer.add(0, "a", &TermInfo::default()).is_err());
        assert!(writer.add(0, "b", &TermInfo::default()).is_err());
    }
}
