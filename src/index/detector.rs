use log::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::file_names::{last_commit_generation, segments_file_name};
use crate::index::generation::{FormatMarker, Generation};
use crate::store::codec_util::CODEC_MAGIC;
use crate::store::data_input::IndexInput;
use crate::store::directory::Directory;

/// Decode the leading marker of a commit file. Leaves `input` positioned
/// right after the marker (and after codec name + version when versioned).
pub fn read_commit_marker(input: &mut IndexInput) -> Result<FormatMarker> {
    let first = input.read_int()?;
    if first == CODEC_MAGIC {
        let codec = input.read_string()?;
        let version = input.read_int()?;
        Ok(FormatMarker::Versioned { codec, version })
    } else if first < 0 {
        Ok(FormatMarker::Legacy(first))
    } else {
        Ok(FormatMarker::Unknown(first))
    }
}

/// Name of the newest commit file in `dir`
pub fn latest_commit_file(dir: &dyn Directory) -> Result<String> {
    let files = dir.list_all()?;
    match last_commit_generation(&files) {
        Some(generation) => Ok(segments_file_name(generation)),
        None => Err(Error::new(
            ErrorKind::NotFound,
            format!("no commit file found in {:?}", files),
        )),
    }
}

/// Classify the generation a single commit file was written in
pub fn commit_generation(dir: &dyn Directory, file_name: &str) -> Result<Generation> {
    let mut input = dir.open_input(file_name)?;
    let marker = read_commit_marker(&mut input)?;
    let generation = Generation::classify(&marker).map_err(|e| {
        Error::new(e.kind, format!("{} (resource={})", e.context, file_name))
    })?;
    debug!("{}: marker {:?} classified as {}", file_name, marker, generation);
    Ok(generation)
}

/// Format generation of the index in `dir`, read from its newest commit.
/// Read-only; fails instead of guessing.
pub fn detect(dir: &dyn Directory) -> Result<Generation> {
    let file_name = latest_commit_file(dir)?;
    commit_generation(dir, &file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::codec_util::write_header;
    use crate::store::data_output::IndexOutput;
    use crate::store::RamDirectory;

    fn legacy(dir: &RamDirectory, name: &str, marker: i32) {
        let mut out = IndexOutput::new(name);
        out.write_int(marker);
        out.write_long(1);
        out.finish(dir).unwrap();
    }

    #[test]
    fn newest_commit_decides() {
        let dir = RamDirectory::new();
        legacy(&dir, "segments_1", -9);
        legacy(&dir, "segments_2", -11);
        assert_eq!(detect(&dir).unwrap(), Generation::V3);

        let mut out = IndexOutput::new("segments_a");
        write_header(&mut out, "segments", 5);
        out.finish(&dir).unwrap();
        assert_eq!(detect(&dir).unwrap(), Generation::V5);
        assert_eq!(commit_generation(&dir, "segments_1").unwrap(), Generation::V2);
    }

    #[test]
    fn positive_marker_is_unrecognized() {
        let dir = RamDirectory::new();
        legacy(&dir, "segments", 3);
        let err = detect(&dir).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnrecognizedFormat);
        assert!(err.context.contains("segments"));
    }

    #[test]
    fn empty_directory_has_no_commit() {
        let dir = RamDirectory::new();
        assert_eq!(detect(&dir).unwrap_err().kind, ErrorKind::NotFound);
    }

    #[test]
    fn truncated_header_is_corruption() {
        let dir = RamDirectory::new();
        dir.write_file("segments_3", vec![0x3f, 0xd7]).unwrap();
        assert!(detect(&dir).unwrap_err().is_corruption());
    }
}
