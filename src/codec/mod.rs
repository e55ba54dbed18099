//! Per-generation access to index files.
//!
//! Every generation exposes the same capabilities; the upgrader picks the
//! codec of the detected generation to read and the codec of the next one to
//! write, and never looks at layouts itself.

mod params;

pub use params::FormatParams;

use crate::core::config::UpgradeConfig;
use crate::core::error::{Error, Result};
use crate::index::commit::{SegmentInfo, SegmentInfos};
use crate::index::generation::Generation;
use crate::index::merger::{MergeAbort, SegmentMerger};
use crate::index::postings::SegmentPostings;
use crate::index::segment_reader::SegmentReader;
use crate::index::term::TermInfo;
use crate::index::term_enum::SegmentTermEnum;
use crate::store::directory::Directory;

pub trait Codec: Send + Sync {
    fn generation(&self) -> Generation;

    fn params(&self) -> FormatParams {
        FormatParams::for_generation(self.generation())
    }

    /// Read a commit file, which must be written in this codec's generation
    fn read_commit(&self, dir: &dyn Directory, file_name: &str) -> Result<SegmentInfos> {
        let infos = SegmentInfos::read(dir, file_name)?;
        if infos.format != self.generation() {
            return Err(Error::invalid_argument(format!(
                "{} is a {} commit, not {}",
                file_name,
                infos.format,
                self.generation()
            )));
        }
        Ok(infos)
    }

    /// Write `infos` as the next commit generation in this codec's layout
    fn write_commit(&self, dir: &dyn Directory, infos: &mut SegmentInfos) -> Result<String> {
        infos.format = self.generation();
        infos.commit(dir)
    }

    fn open_segment(&self, dir: &dyn Directory, info: &SegmentInfo, config: &UpgradeConfig) -> Result<SegmentReader> {
        SegmentReader::open(dir, info, self.params(), config)
    }

    fn open_segments(&self, dir: &dyn Directory, infos: &SegmentInfos, config: &UpgradeConfig) -> Result<Vec<SegmentReader>> {
        infos.segments.iter().map(|info| self.open_segment(dir, info, config)).collect()
    }

    fn iterate_terms(&self, reader: &SegmentReader) -> SegmentTermEnum {
        reader.terms()
    }

    fn iterate_postings(&self, reader: &SegmentReader, field: u32, info: TermInfo) -> Result<SegmentPostings> {
        reader.postings(field, info)
    }

    /// Merge the live documents of `readers` into segment `name` written in
    /// this codec's layout
    fn write_segment(
        &self,
        dir: &dyn Directory,
        name: &str,
        readers: &[SegmentReader],
        abort: &MergeAbort,
    ) -> Result<SegmentInfo> {
        SegmentMerger::new(readers, self.params(), abort.clone()).merge(dir, name)
    }
}

pub struct V2Codec;
pub struct V3Codec;
pub struct V4Codec;
pub struct V5Codec;

impl Codec for V2Codec {
    fn generation(&self) -> Generation {
        Generation::V2
    }
}

impl Codec for V3Codec {
    fn generation(&self) -> Generation {
        Generation::V3
    }
}

impl Codec for V4Codec {
    fn generation(&self) -> Generation {
        Generation::V4
    }
}

impl Codec for V5Codec {
    fn generation(&self) -> Generation {
        Generation::V5
    }
}

pub fn codec_for(generation: Generation) -> &'static dyn Codec {
    match generation {
        Generation::V2 => &V2Codec,
        Generation::V3 => &V3Codec,
        Generation::V4 => &V4Codec,
        Generation::V5 => &V5Codec,
    }
}
