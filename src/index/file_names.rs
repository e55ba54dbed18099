use std::sync::LazyLock;
use regex::Regex;
use crate::util::base36::{parse_base36, to_base36};

pub const SEGMENTS: &str = "segments";
pub const PENDING_SEGMENTS: &str = "pending_segments";

pub const FIELD_INFOS_EXTENSION: &str = "fnm";
pub const TERMS_EXTENSION: &str = "tis";
pub const TERMS_INDEX_EXTENSION: &str = "tii";
pub const FREQ_EXTENSION: &str = "frq";
pub const PROX_EXTENSION: &str = "prx";
pub const FIELDS_INDEX_EXTENSION: &str = "fdx";
pub const FIELDS_EXTENSION: &str = "fdt";
pub const DELETES_EXTENSION: &str = "del";

pub const SEGMENT_EXTENSIONS: [&str; 8] = [
    FIELD_INFOS_EXTENSION,
    TERMS_EXTENSION,
    TERMS_INDEX_EXTENSION,
    FREQ_EXTENSION,
    PROX_EXTENSION,
    FIELDS_INDEX_EXTENSION,
    FIELDS_EXTENSION,
    DELETES_EXTENSION,
];

static INDEX_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(segments(_[0-9a-z]+)?|_[0-9a-z]+(_[0-9a-z]+)?\.(fnm|tis|tii|frq|prx|fdx|fdt|del))$")
        .expect("valid regex")
});

/// Whether `name` is a file this index owns (commits and segment files)
pub fn is_index_file(name: &str) -> bool {
    INDEX_FILE.is_match(name)
}

pub fn is_commit_file(name: &str) -> bool {
    name == SEGMENTS || (name.starts_with("segments_") && generation_from_segments_file_name(name).is_some())
}

/// `segments` for generation 0, `segments_<base36>` otherwise
pub fn segments_file_name(generation: u64) -> String {
    if generation == 0 {
        SEGMENTS.to_string()
    } else {
        format!("{}_{}", SEGMENTS, to_base36(generation))
    }
}

pub fn pending_segments_file_name(generation: u64) -> String {
    format!("{}_{}", PENDING_SEGMENTS, to_base36(generation))
}

/// Generation encoded in a commit file name
pub fn generation_from_segments_file_name(name: &str) -> Option<u64> {
    if name == SEGMENTS {
        return Some(0);
    }
    name.strip_prefix("segments_").and_then(parse_base36)
}

/// Segment names are `_` plus the base-36 name counter
pub fn segment_name(counter: u64) -> String {
    format!("_{}", to_base36(counter))
}

pub fn segment_file_name(segment: &str, extension: &str) -> String {
    format!("{}.{}", segment, extension)
}

/// Segment name of a segment file: everything before the first '.'
pub fn strip_extension(name: &str) -> &str {
    name.split_once('.').map_or(name, |(segment, _)| segment)
}

/// Highest generation among the commit files in `files`
pub fn last_commit_generation<S: AsRef<str>>(files: &[S]) -> Option<u64> {
    files
        .iter()
        .filter(|f| is_commit_file(f.as_ref()))
        .filter_map(|f| generation_from_segments_file_name(f.as_ref()))
        .max()
}
