use crc32fast::Hasher;
use crate::core::error::{Error, ErrorKind, Result};
use crate::store::data_input::IndexInput;
use crate::store::data_output::IndexOutput;

/// First int of every versioned header
pub const CODEC_MAGIC: i32 = 0x3fd76c17;
/// First int of every footer
pub const FOOTER_MAGIC: i32 = !CODEC_MAGIC;
/// Footer: magic + algorithm id + checksum
pub const FOOTER_LENGTH: u64 = 16;

pub fn write_header(out: &mut IndexOutput, codec: &str, version: i32) {
    out.write_int(CODEC_MAGIC);
    out.write_string(codec);
    out.write_int(version);
}

pub fn header_length(codec: &str) -> u64 {
    9 + codec.len() as u64
}

/// Validate a header and return the version found in it
pub fn check_header(input: &mut IndexInput, codec: &str, min_version: i32, max_version: i32) -> Result<i32> {
    let offset = input.position();
    let magic = input.read_int()?;
    if magic != CODEC_MAGIC {
        return Err(Error::corrupt(
            input.name(),
            offset,
            format!("codec header mismatch: actual header={:#x} vs expected header={:#x}", magic, CODEC_MAGIC),
        ));
    }
    check_header_no_magic(input, codec, min_version, max_version)
}

/// Like `check_header` when the magic has already been consumed
pub fn check_header_no_magic(input: &mut IndexInput, codec: &str, min_version: i32, max_version: i32) -> Result<i32> {
    let actual_codec = input.read_string()?;
    if actual_codec != codec {
        return Err(input.corrupt(format!("codec mismatch: actual codec={} vs expected codec={}", actual_codec, codec)));
    }
    let version = input.read_int()?;
    if version < min_version || version > max_version {
        return Err(Error::new(
            ErrorKind::UnrecognizedFormat,
            format!("{}: version {} is not in range [{}, {}] (resource={})", codec, version, min_version, max_version, input.name()),
        ));
    }
    Ok(version)
}

pub fn write_footer(out: &mut IndexOutput) {
    out.write_int(FOOTER_MAGIC);
    out.write_int(0);
    // checksum covers everything up to and including the algorithm id
    let checksum = out.checksum();
    out.write_long(checksum as i64);
}

/// Verify the footer of a whole-file input and return the stored checksum.
/// Leaves the input position unchanged.
pub fn check_footer(input: &mut IndexInput) -> Result<u32> {
    let len = input.len();
    if len < FOOTER_LENGTH {
        return Err(Error::corrupt(input.name(), 0, "file too short to hold a footer"));
    }
    let saved = input.position();
    input.seek(len - FOOTER_LENGTH)?;
    let magic = input.read_int()?;
    if magic != FOOTER_MAGIC {
        return Err(input.corrupt(format!("codec footer mismatch: actual footer={:#x}", magic)));
    }
    let algorithm = input.read_int()?;
    if algorithm != 0 {
        return Err(input.corrupt(format!("unknown checksum algorithm {}", algorithm)));
    }
    let expected = input.read_long()?;

    let mut hasher = Hasher::new();
    hasher.update(&input.bytes()[..(len - 8) as usize]);
    let actual = hasher.finalize();
    if expected < 0 || expected as u64 != actual as u64 {
        return Err(Error::corrupt(
            input.name(),
            len - 8,
            format!("checksum failed: expected={:#x} actual={:#x}", expected, actual),
        ));
    }
    input.seek(saved)?;
    Ok(actual)
}

/// Trailing plain CRC32 long used by commit files without a footer
pub fn write_checksum(out: &mut IndexOutput) {
    let checksum = out.checksum();
    out.write_long(checksum as i64);
}

pub fn check_checksum(input: &mut IndexInput) -> Result<()> {
    let len = input.len();
    if len < 8 {
        return Err(Error::corrupt(input.name(), 0, "file too short to hold a checksum"));
    }
    let saved = input.position();
    input.seek(len - 8)?;
    let expected = input.read_long()?;
    let mut hasher = Hasher::new();
    hasher.update(&input.bytes()[..(len - 8) as usize]);
    let actual = hasher.finalize();
    if expected < 0 || expected as u64 != actual as u64 {
        return Err(Error::corrupt(
            input.name(),
            len - 8,
            format!("checksum mismatch in commit: expected={:#x} actual={:#x}", expected, actual),
        ));
    }
    input.seek(saved)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn header_and_footer_validate() {
        let mut out = IndexOutput::new("_0.tis");
        write_header(&mut out, "TermDict", 2);
        out.write_vint(42);
        write_footer(&mut out);

        let mut input = IndexInput::new("_0.tis", Bytes::from(out.into_bytes()));
        check_footer(&mut input).unwrap();
        assert_eq!(check_header(&mut input, "TermDict", 0, 2).unwrap(), 2);
        assert_eq!(input.position(), header_length("TermDict"));
        assert_eq!(input.read_vint().unwrap(), 42);
    }

    #[test]
    fn flipped_byte_fails_footer() {
        let mut out = IndexOutput::new("_0.frq");
        write_header(&mut out, "Postings", 0);
        out.write_bytes(&[1, 2, 3, 4]);
        write_footer(&mut out);
        let mut bytes = out.into_bytes();
        bytes[20] ^= 0x40;

        let mut input = IndexInput::new("_0.frq", Bytes::from(bytes));
        assert_eq!(check_footer(&mut input).unwrap_err().kind, ErrorKind::CorruptIndex);
    }

    #[test]
    fn version_out_of_range_is_unrecognized() {
        let mut out = IndexOutput::new("x");
        write_header(&mut out, "PackedInts", 7);
        let mut input = IndexInput::new("x", Bytes::from(out.into_bytes()));
        assert_eq!(check_header(&mut input, "PackedInts", 0, 0).unwrap_err().kind, ErrorKind::UnrecognizedFormat);
    }
}
