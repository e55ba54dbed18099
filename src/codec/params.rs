use crate::core::error::Result;
use crate::index::generation::Generation;
use crate::store::codec_util;
use crate::store::data_input::IndexInput;
use crate::store::data_output::IndexOutput;

/// Fixed per-generation layout constants of segment files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatParams {
    pub generation: Generation,
    /// Every n-th term of `.tis` is repeated in `.tii`
    pub term_index_interval: u32,
    pub skip_interval: u32,
    pub max_skip_levels: u32,
}

impl FormatParams {
    pub fn for_generation(generation: Generation) -> Self {
        let term_index_interval = match generation {
            Generation::V2 | Generation::V3 => 128,
            Generation::V4 | Generation::V5 => 32,
        };
        FormatParams {
            generation,
            term_index_interval,
            skip_interval: 16,
            max_skip_levels: 10,
        }
    }

    /// Version stamped into the codec header of each segment file
    pub fn file_version(&self) -> i32 {
        match self.generation {
            Generation::V5 => 1,
            _ => 0,
        }
    }

    /// Codec header, versioned generations only
    pub fn write_header(&self, out: &mut IndexOutput, codec: &str) {
        if self.generation.has_versioned_header() {
            codec_util::write_header(out, codec, self.file_version());
        }
    }

    pub fn header_length(&self, codec: &str) -> u64 {
        if self.generation.has_versioned_header() { codec_util::header_length(codec) } else { 0 }
    }

    pub fn check_header(&self, input: &mut IndexInput, codec: &str) -> Result<()> {
        if self.generation.has_versioned_header() {
            let version = self.file_version();
            codec_util::check_header(input, codec, version, version)?;
        }
        Ok(())
    }

    /// Footer, V5 only
    pub fn write_trailer(&self, out: &mut IndexOutput) {
        if self.generation.has_footer() {
            codec_util::write_footer(out);
        }
    }

    /// Verify the trailer and return where file data ends
    pub fn check_trailer(&self, input: &mut IndexInput) -> Result<u64> {
        if self.generation.has_footer() {
            codec_util::check_footer(input)?;
            Ok(input.len() - codec_util::FOOTER_LENGTH)
        } else {
            Ok(input.len())
        }
    }
}
