use std::cmp::Ordering;
use std::sync::Arc;
use crate::core::error::{Error, Result};
use crate::index::field_infos::FieldInfos;
use crate::index::term::{Term, TermInfo};
use crate::index::term_enum::{NO_FIELD, SegmentTermEnum};
use crate::packed::{GrowableWriter, Mutable, Reader};
use crate::util::paged_bytes::{PagedBytes, PagedBytesInput};
use crate::util::string_order::compare_utf8_as_utf16;

/// In-memory, binary searchable sample of a term dictionary.
///
/// Built once from a `.tii` enum. Every loaded sample is serialized into a
/// `PagedBytes` store:
///
/// ```text
/// vint  field number + 1 (0 for the leading empty term)
/// vint  text length, text bytes
/// vint  doc freq
/// vint  skip offset          (doc freq > skip interval only)
/// vlong freq pointer
/// vlong prox pointer
/// vlong .tis pointer following the term
/// ```
///
/// and its start offset is kept in a packed array indexed by sample ordinal.
pub struct TermIndex {
    data: PagedBytes,
    offsets: Box<dyn Mutable>,
    field_infos: Arc<FieldInfos>,
    /// `.tis` ordinal distance between consecutive samples
    total_index_interval: u64,
    skip_interval: u32,
}

struct Sample {
    field: u32,
    text: Vec<u8>,
    info: TermInfo,
    pointer: u64,
}

impl TermIndex {
    /// Load every `divisor`-th entry of `index_enum`
    pub fn build(index_enum: &mut SegmentTermEnum, divisor: usize, estimated_bytes: u64) -> Result<Self> {
        let divisor = divisor.max(1);
        let total = index_enum.size() as usize;
        let count = total.div_ceil(divisor);
        let skip_interval = index_enum.skip_interval();
        let total_index_interval = index_enum.index_interval() as u64 * divisor as u64;

        let mut data = PagedBytes::new(PagedBytes::estimate_page_bits(estimated_bytes / divisor as u64));
        let mut offsets = GrowableWriter::new(4, count, false)?;
        {
            let mut out = data.output()?;
            let mut sample = 0usize;
            let mut i = 0usize;
            while index_enum.next()? {
                if i % divisor == 0 {
                    offsets.set(sample, out.position())?;
                    let field = index_enum.field_number().map_or(0, |f| f + 1);
                    let info = index_enum.term_info();
                    out.write_vint(field);
                    out.write_bytes_with_len(index_enum.term_bytes());
                    out.write_vint(info.doc_freq);
                    if info.doc_freq > skip_interval {
                        out.write_vint(info.skip_offset);
                    }
                    out.write_vlong(info.freq_pointer);
                    out.write_vlong(info.prox_pointer);
                    out.write_vlong(index_enum.index_pointer());
                    sample += 1;
                }
                i += 1;
            }
            if sample != count {
                return Err(Error::corrupt(
                    "term index",
                    i as u64,
                    format!("expected {} samples, decoded {}", count, sample),
                ));
            }
        }
        data.freeze();

        Ok(TermIndex {
            data,
            offsets: offsets.freeze()?,
            field_infos: index_enum.field_infos().clone(),
            total_index_interval,
            skip_interval,
        })
    }

    /// Number of samples held in memory
    pub fn len(&self) -> usize {
        self.offsets.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ram_bytes_used(&self) -> usize {
        self.data.ram_bytes_used() + self.offsets.size() * self.offsets.bits_per_value() as usize / 8
    }

    fn input(&self, ordinal: usize) -> Result<PagedBytesInput<'_>> {
        if ordinal >= self.len() {
            return Err(Error::invalid_argument(format!("sample {} out of range {}", ordinal, self.len())));
        }
        self.data.input(self.offsets.get(ordinal))
    }

    fn read_sample(&self, ordinal: usize) -> Result<Sample> {
        let mut input = self.input(ordinal)?;
        let field = match input.read_vint()? {
            0 => NO_FIELD,
            f => f - 1,
        };
        let mut text = Vec::new();
        input.read_bytes_with_len(&mut text)?;
        let doc_freq = input.read_vint()?;
        let skip_offset = if doc_freq > self.skip_interval { input.read_vint()? } else { 0 };
        let freq_pointer = input.read_vlong()?;
        let prox_pointer = input.read_vlong()?;
        let pointer = input.read_vlong()?;
        Ok(Sample {
            field,
            text,
            info: TermInfo { doc_freq, freq_pointer, prox_pointer, skip_offset },
            pointer,
        })
    }

    /// Index of the greatest sample <= `term`, None when every sample is
    /// greater (or there are none)
    pub fn get_index_offset(&self, term: &Term) -> Result<Option<usize>> {
        let mut lo: i64 = 0;
        let mut hi: i64 = self.len() as i64 - 1;
        while hi >= lo {
            let mid = (lo + hi) >> 1;
            match self.compare_to(term, mid as usize)? {
                Ordering::Less => hi = mid - 1,
                Ordering::Greater => lo = mid + 1,
                Ordering::Equal => return Ok(Some(mid as usize)),
            }
        }
        Ok(if hi < 0 { None } else { Some(hi as usize) })
    }

    /// Position `term_enum` on sample `ordinal`
    pub fn seek_enum(&self, term_enum: &mut SegmentTermEnum, ordinal: usize) -> Result<()> {
        let sample = self.read_sample(ordinal)?;
        let position = ordinal as i64 * self.total_index_interval as i64 - 1;
        term_enum.seek(sample.pointer, position, sample.field, &sample.text, sample.info)
    }

    /// Term of sample `ordinal`; None for the leading empty entry
    pub fn get_term(&self, ordinal: usize) -> Result<Option<Term>> {
        let sample = self.read_sample(ordinal)?;
        if sample.field == NO_FIELD {
            return Ok(None);
        }
        let field = self.field_name(sample.field)?;
        let text = String::from_utf8(sample.text)
            .map_err(|e| Error::corrupt("term index", self.offsets.get(ordinal), e))?;
        Ok(Some(Term::new(field, text)))
    }

    fn field_name(&self, number: u32) -> Result<&str> {
        self.field_infos
            .name(number)
            .ok_or_else(|| Error::corrupt("term index", 0, format!("unknown field number {}", number)))
    }

    /// Compare `term` with sample `ordinal`: field name first, then text
    pub fn compare_to(&self, term: &Term, ordinal: usize) -> Result<Ordering> {
        let mut input = self.input(ordinal)?;
        let field = input.read_vint()?;
        if field == 0 {
            return Ok(Ordering::Greater);
        }
        let name = self.field_name(field - 1)?;
        let by_field = compare_utf8_as_utf16(term.field.as_bytes(), name.as_bytes());
        if by_field != Ordering::Equal {
            return Ok(by_field);
        }
        let mut text = Vec::new();
        input.read_bytes_with_len(&mut text)?;
        Ok(compare_utf8_as_utf16(term.text.as_bytes(), &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FormatParams;
    use crate::index::file_names::{TERMS_EXTENSION, TERMS_INDEX_EXTENSION, segment_file_name};
    use crate::index::generation::Generation;
    use crate::index::term_infos_writer::TermInfosWriter;
    use crate::store::{Directory, RamDirectory};

    struct Fixture {
        dir: RamDirectory,
        field_infos: Arc<FieldInfos>,
        params: FormatParams,
        terms: Vec<Term>,
    }

    /// `count` body terms written with the V4 index interval of 32
    fn fixture(count: usize) -> Fixture {
        let dir = RamDirectory::new();
        let params = FormatParams::for_generation(Generation::V4);
        let mut field_infos = FieldInfos::new();
        let body = field_infos.add("body", true, false, false);
        let field_infos = Arc::new(field_infos);
        let terms: Vec<Term> = (0..count).map(|i| Term::new("body", format!("t{:05}", i))).collect();
        let mut writer = TermInfosWriter::new("_0", field_infos.clone(), params);
        for (i, term) in terms.iter().enumerate() {
            let info = TermInfo { doc_freq: 1, freq_pointer: i as u64, prox_pointer: i as u64, skip_offset: 0 };
            writer.add(body, &term.text, &info).unwrap();
        }
        writer.finish(&dir).unwrap();
        Fixture { dir, field_infos, params, terms }
    }

    impl Fixture {
        fn index(&self, divisor: usize) -> TermIndex {
            let name = segment_file_name("_0", TERMS_INDEX_EXTENSION);
            let input = self.dir.open_input(&name).unwrap();
            let mut index_enum = SegmentTermEnum::open(input, self.field_infos.clone(), &self.params, true).unwrap();
            TermIndex::build(&mut index_enum, divisor, self.dir.file_length(&name).unwrap()).unwrap()
        }

        fn terms_enum(&self) -> SegmentTermEnum {
            let input = self.dir.open_input(&segment_file_name("_0", TERMS_EXTENSION)).unwrap();
            SegmentTermEnum::open(input, self.field_infos.clone(), &self.params, false).unwrap()
        }
    }

    #[test]
    fn query_before_every_term_lands_on_leading_entry() {
        let fixture = fixture(320);
        let index = fixture.index(1);
        // leading empty entry plus one sample per 32 terms
        assert_eq!(index.len(), 10);
        assert_eq!(index.get_term(0).unwrap(), None);
        assert_eq!(index.get_index_offset(&Term::new("a", "zzz")).unwrap(), Some(0));
        assert_eq!(index.get_index_offset(&Term::new("body", "")).unwrap(), Some(0));
        assert_eq!(index.get_index_offset(&fixture.terms[30]).unwrap(), Some(0));
    }

    #[test]
    fn empty_dictionary_has_no_offset() {
        let index = fixture(0).index(1);
        assert!(index.is_empty());
        assert_eq!(index.get_index_offset(&Term::new("body", "t00000")).unwrap(), None);
    }

    #[test]
    fn every_sample_finds_itself() {
        let fixture = fixture(320);
        let index = fixture.index(1);
        for ordinal in 1..index.len() {
            let sample = index.get_term(ordinal).unwrap().unwrap();
            assert_eq!(sample, fixture.terms[ordinal * 32 - 1]);
            assert_eq!(index.compare_to(&sample, ordinal).unwrap(), Ordering::Equal);
            assert_eq!(index.get_index_offset(&sample).unwrap(), Some(ordinal));
            // terms between two samples resolve to the lower one
            assert_eq!(index.get_index_offset(&fixture.terms[ordinal * 32]).unwrap(), Some(ordinal));
        }
        assert_eq!(index.get_index_offset(&Term::new("title", "a")).unwrap(), Some(index.len() - 1));
    }

    #[test]
    fn divisor_keeps_every_nth_sample() {
        let fixture = fixture(320);
        let index = fixture.index(3);
        // entries 0, 3, 6 and 9 of the ten on disk
        assert_eq!(index.len(), 4);
        assert_eq!(index.get_term(1).unwrap(), Some(fixture.terms[95].clone()));
        assert_eq!(index.get_term(3).unwrap(), Some(fixture.terms[287].clone()));
        assert_eq!(index.get_index_offset(&fixture.terms[94]).unwrap(), Some(0));
        assert_eq!(index.get_index_offset(&fixture.terms[95]).unwrap(), Some(1));
        assert_eq!(index.get_index_offset(&fixture.terms[190]).unwrap(), Some(1));
        assert_eq!(index.get_index_offset(&fixture.terms[319]).unwrap(), Some(3));

        let mut terms = fixture.terms_enum();
        index.seek_enum(&mut terms, 2).unwrap();
        assert_eq!(terms.position(), 191);
        assert!(terms.next().unwrap());
        assert_eq!(terms.term(), Some(fixture.terms[192].clone()));
        assert_eq!(terms.term_info().freq_pointer, 192);
    }
}
