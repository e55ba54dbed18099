use std::collections::BTreeMap;
use log::{debug, info, warn};
use uuid::Uuid;
use crate::core::error::{Error, Result};
use crate::index::detector::read_commit_marker;
use crate::index::file_names::{
    self, generation_from_segments_file_name, pending_segments_file_name, segments_file_name,
};
use crate::index::generation::{FormatMarker, Generation};
use crate::store::codec_util;
use crate::store::data_input::IndexInput;
use crate::store::data_output::IndexOutput;
use crate::store::directory::Directory;

/// Descriptor of one segment as recorded in a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    pub name: String,
    pub max_doc: u32,
    pub del_count: u32,
    /// Every file the segment owns, commit-independent
    pub files: Vec<String>,
    /// Random identity, only persisted by V5 commits
    pub id: Option<[u8; 16]>,
}

impl SegmentInfo {
    pub fn new(name: impl Into<String>, max_doc: u32, files: Vec<String>) -> Self {
        SegmentInfo {
            name: name.into(),
            max_doc,
            del_count: 0,
            files,
            id: None,
        }
    }

    pub fn num_docs(&self) -> u32 {
        self.max_doc - self.del_count.min(self.max_doc)
    }

    pub fn has_deletions(&self) -> bool {
        self.del_count > 0
    }

    pub fn deletes_file_name(&self) -> String {
        file_names::segment_file_name(&self.name, file_names::DELETES_EXTENSION)
    }

    /// Sum of the lengths of the segment's files
    pub fn size_in_bytes(&self, dir: &dyn Directory) -> Result<u64> {
        let mut total = 0;
        for file in &self.files {
            total += dir.file_length(file)?;
        }
        Ok(total)
    }
}

/// A commit: the ordered list of live segments plus bookkeeping counters.
///
/// `generation` is the number encoded in the commit file name; `format` is the
/// on-disk epoch the commit was (or will be) written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfos {
    pub generation: u64,
    pub format: Generation,
    pub version: u64,
    /// Next segment name counter
    pub counter: u64,
    pub segments: Vec<SegmentInfo>,
    pub user_data: BTreeMap<String, String>,
}

impl SegmentInfos {
    pub fn new(format: Generation) -> Self {
        SegmentInfos {
            generation: 0,
            format,
            version: 0,
            counter: 0,
            segments: Vec::new(),
            user_data: BTreeMap::new(),
        }
    }

    pub fn segments_file_name(&self) -> String {
        segments_file_name(self.generation)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.num_docs() as u64).sum()
    }

    /// Reserve a fresh segment name
    pub fn new_segment_name(&mut self) -> String {
        let name = file_names::segment_name(self.counter);
        self.counter += 1;
        name
    }

    /// Files referenced by this commit, optionally including the commit file
    pub fn files(&self, include_commit: bool) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();
        if include_commit {
            files.push(self.segments_file_name());
        }
        for segment in &self.segments {
            for file in &segment.files {
                if !files.contains(file) {
                    files.push(file.clone());
                }
            }
        }
        files
    }

    /// Read the newest commit in `dir`
    pub fn read_latest(dir: &dyn Directory) -> Result<Self> {
        let name = crate::index::detector::latest_commit_file(dir)?;
        Self::read(dir, &name)
    }

    /// Read and verify one commit file
    pub fn read(dir: &dyn Directory, file_name: &str) -> Result<Self> {
        let generation = generation_from_segments_file_name(file_name)
            .ok_or_else(|| Error::invalid_argument(format!("not a commit file: {}", file_name)))?;
        let mut input = dir.open_input(file_name)?;
        let marker = read_commit_marker(&mut input)?;
        let format = Generation::classify(&marker)?;

        let trailer = if format.has_footer() {
            codec_util::check_footer(&mut input)?;
            codec_util::FOOTER_LENGTH
        } else {
            codec_util::check_checksum(&mut input)?;
            8
        };
        let body_end = input.len() - trailer;

        let version = input.read_long()? as u64;
        let counter = input.read_int()?;
        let seg_count = input.read_int()?;
        if counter < 0 || seg_count < 0 {
            return Err(input.corrupt(format!("invalid counter {} or segment count {}", counter, seg_count)));
        }

        let mut segments = Vec::with_capacity(seg_count as usize);
        for _ in 0..seg_count {
            segments.push(read_segment(&mut input, format)?);
        }

        let mut user_data = BTreeMap::new();
        let entries = input.read_vint()?;
        for _ in 0..entries {
            let key = input.read_string()?;
            let value = input.read_string()?;
            user_data.insert(key, value);
        }

        if input.position() != body_end {
            return Err(input.corrupt(format!("commit body ends at {}, expected {}", input.position(), body_end)));
        }

        debug!("read {} ({}): {} segments", file_name, format, segments.len());
        Ok(SegmentInfos {
            generation,
            format,
            version,
            counter: counter as u64,
            segments,
            user_data,
        })
    }

    /// Write this commit as generation `self.generation + 1` in layout
    /// `self.format`.
    ///
    /// Bytes go to `pending_segments_N` first, then the file is renamed into
    /// place so a reader never sees a half written commit.
    pub fn commit(&mut self, dir: &dyn Directory) -> Result<String> {
        let next_generation = self.generation + 1;
        let pending = pending_segments_file_name(next_generation);
        let final_name = segments_file_name(next_generation);

        if self.format.has_footer() {
            for segment in self.segments.iter_mut().filter(|s| s.id.is_none()) {
                segment.id = Some(*Uuid::new_v4().as_bytes());
            }
        }

        let mut out = IndexOutput::new(pending.clone());
        self.write_body(&mut out)?;

        let result = out
            .finish(dir)
            .and_then(|_| dir.rename(&pending, &final_name))
            .and_then(|_| dir.sync_metadata());
        if let Err(e) = result {
            if dir.file_exists(&pending) {
                if let Err(cleanup) = dir.delete_file(&pending) {
                    warn!("could not remove {} after failed commit: {}", pending, cleanup);
                }
            }
            return Err(e);
        }

        self.generation = next_generation;
        self.version += 1;
        info!("wrote commit {} ({}, {} segments)", final_name, self.format, self.segments.len());
        Ok(final_name)
    }

    fn write_body(&self, out: &mut IndexOutput) -> Result<()> {
        match self.format.commit_marker() {
            FormatMarker::Legacy(marker) => out.write_int(marker),
            FormatMarker::Versioned { codec, version } => codec_util::write_header(out, &codec, version),
            FormatMarker::Unknown(m) => {
                return Err(Error::invalid_state(format!("cannot write format marker {}", m)));
            }
        }
        out.write_long((self.version + 1) as i64);
        out.write_int(self.counter as i32);
        out.write_int(self.segments.len() as i32);
        for segment in &self.segments {
            out.write_string(&segment.name);
            if self.format.has_footer() {
                let id = segment
                    .id
                    .ok_or_else(|| Error::invalid_state(format!("segment {} has no id", segment.name)))?;
                out.write_bytes(&id);
            }
            out.write_int(segment.max_doc as i32);
            out.write_int(segment.del_count as i32);
            out.write_vint(segment.files.len() as u32);
            for file in &segment.files {
                out.write_string(file);
            }
        }
        out.write_vint(self.user_data.len() as u32);
        for (key, value) in &self.user_data {
            out.write_string(key);
            out.write_string(value);
        }
        if self.format.has_footer() {
            codec_util::write_footer(out);
        } else {
            codec_util::write_checksum(out);
        }
        Ok(())
    }
}

fn read_segment(input: &mut IndexInput, format: Generation) -> Result<SegmentInfo> {
    let name = input.read_string()?;
    let id = if format.has_footer() {
        let mut id = [0u8; 16];
        id.copy_from_slice(input.read_bytes(16)?);
        Some(id)
    } else {
        None
    };
    let max_doc = input.read_int()?;
    let del_count = input.read_int()?;
    if max_doc < 0 || del_count < 0 || del_count > max_doc {
        return Err(input.corrupt(format!(
            "segment {}: invalid doc counts maxDoc={} delCount={}",
            name, max_doc, del_count
        )));
    }
    let file_count = input.read_vint()?;
    let mut files = Vec::with_capacity(file_count as usize);
    for _ in 0..file_count {
        files.push(input.read_string()?);
    }
    Ok(SegmentInfo {
        name,
        max_doc: max_doc as u32,
        del_count: del_count as u32,
        files,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::store::RamDirectory;

    fn sample(format: Generation) -> SegmentInfos {
        let mut infos = SegmentInfos::new(format);
        let a = infos.new_segment_name();
        let b = infos.new_segment_name();
        infos.segments.push(SegmentInfo::new(a.clone(), 10, vec![format!("{}.tis", a), format!("{}.frq", a)]));
        let mut second = SegmentInfo::new(b.clone(), 4, vec![format!("{}.tis", b), format!("{}.del", b)]);
        second.del_count = 2;
        infos.segments.push(second);
        infos.user_data.insert("source".to_string(), "test".to_string());
        infos
    }

    #[test]
    fn failed_commit_reports_the_write_error() {
        let dir = RamDirectory::new();
        dir.write_file("pending_segments_1", vec![0]).unwrap();
        dir.hold_open("pending_segments_1");
        let mut infos = sample(Generation::V4);
        let err = infos.commit(&dir).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
        assert!(!dir.file_exists("segments_1"));
        assert_eq!(infos.generation, 0);

        dir.release("pending_segments_1");
        dir.delete_file("pending_segments_1").unwrap();
        assert_eq!(infos.commit(&dir).unwrap(), "segments_1");
    }

    #[test]
    fn every_layout_reads_back() {
        for format in Generation::ALL {
            let dir = RamDirectory::new();
            let mut infos = sample(format);
            let name = infos.commit(&dir).unwrap();
            assert_eq!(name, "segments_1");
            assert!(!dir.file_exists("pending_segments_1"));

            let read = SegmentInfos::read(&dir, &name).unwrap();
            assert_eq!(read, infos, "format {}", format);
            assert_eq!(read.total_docs(), 12);
            assert_eq!(read.segments[0].id.is_some(), format == Generation::V5);
        }
    }

    #[test]
    fn commit_bumps_generation_by_one() {
        let dir = RamDirectory::new();
        let mut infos = sample(Generation::V3);
        infos.commit(&dir).unwrap();
        infos.format = Generation::V4;
        let name = infos.commit(&dir).unwrap();
        assert_eq!(name, "segments_2");
        let latest = SegmentInfos::read_latest(&dir).unwrap();
        assert_eq!(latest.generation, 2);
        assert_eq!(latest.format, Generation::V4);
        assert_eq!(latest.version, 2);
    }

    #[test]
    fn files_are_unique_and_include_commit() {
        let mut infos = sample(Generation::V2);
        infos.generation = 3;
        infos.segments[1].files.push("_0.tis".to_string());
        let files = infos.files(true);
        assert_eq!(files[0], "segments_3");
        assert_eq!(files.iter().filter(|f| f.as_str() == "_0.tis").count(), 1);
        assert_eq!(infos.files(false).len(), files.len() - 1);
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        for format in [Generation::V2, Generation::V5] {
            let dir = RamDirectory::new();
            let name = sample(format).commit(&dir).unwrap();
            let mut bytes = dir.read_all(&name).unwrap();
            let mid = bytes.len() / 2;
            bytes[mid] ^= 0x40;
            dir.overwrite(&name, bytes);
            assert!(SegmentInfos::read(&dir, &name).unwrap_err().is_corruption());
        }
    }
}
