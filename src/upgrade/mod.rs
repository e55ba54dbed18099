//! Upgrades an index one generation at a time by merging every segment into
//! a single segment written in the next generation's layout.
//!
//! ```text
//!  Detecting ──terminal──▶ Done(G)
//!      │
//!      ▼
//!  Reading(G) ──▶ Merging(G→G+1) ──▶ Committing(G+1) ──▶ Detecting
//! ```
//!
//! Each hop ends with exactly one new commit. The source commit is never
//! touched before the new one is durable, so a failed or aborted hop leaves
//! the index at its last committed generation.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use log::{debug, info, warn};
use crate::codec::codec_for;
use crate::core::config::UpgradeConfig;
use crate::core::error::{Error, Result, UpgradeError};
use crate::index::commit::SegmentInfos;
use crate::index::deleter::IndexFileDeleter;
use crate::index::deletion_policy::{IndexDeletionPolicy, KeepOnlyLastCommitPolicy};
use crate::index::detector;
use crate::index::generation::Generation;
use crate::index::merge_policy::{MergePolicy, OneMerge, SegmentStats, TieredMergePolicy};
use crate::index::merger::MergeAbort;
use crate::index::segment_reader::SegmentReader;
use crate::store::directory::{Directory, WRITE_LOCK_NAME};
use crate::store::FsDirectory;

pub const UPGRADED_FROM_KEY: &str = "upgraded_from";
pub const UPGRADED_AT_KEY: &str = "upgraded_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    Detecting,
    Reading(Generation),
    Merging { from: Generation, to: Generation },
    Committing(Generation),
    Done(Generation),
}

impl fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UpgradeState::Detecting => write!(f, "detecting"),
            UpgradeState::Reading(g) => write!(f, "reading {}", g),
            UpgradeState::Merging { from, to } => write!(f, "merging {} -> {}", from, to),
            UpgradeState::Committing(g) => write!(f, "committing {}", g),
            UpgradeState::Done(g) => write!(f, "done at {}", g),
        }
    }
}

/// State carried through one hop
struct Hop {
    from: Generation,
    to: Generation,
    infos: SegmentInfos,
    deleter: IndexFileDeleter,
    /// Layout of every segment in `infos`; merged segments are already in `to`
    segment_generations: HashMap<String, Generation>,
}

fn keep_only_last_commit() -> Box<dyn IndexDeletionPolicy> {
    Box::new(KeepOnlyLastCommitPolicy)
}

pub struct IndexUpgrader {
    dir: Arc<dyn Directory>,
    config: UpgradeConfig,
    policy: TieredMergePolicy,
    /// Deletion policy handed to the file deleter of every hop
    deletion_policy: fn() -> Box<dyn IndexDeletionPolicy>,
    abort: MergeAbort,
    state: UpgradeState,
    hop: Option<Hop>,
    /// Generation of the last durable commit seen
    committed: Option<Generation>,
    /// Stop once the index reaches this generation
    target: Generation,
    hops: usize,
}

impl IndexUpgrader {
    pub fn new(dir: Arc<dyn Directory>, config: UpgradeConfig) -> Self {
        let policy = TieredMergePolicy::from_config(&config.merge_policy);
        IndexUpgrader {
            dir,
            config,
            policy,
            deletion_policy: keep_only_last_commit,
            abort: MergeAbort::new(),
            state: UpgradeState::Detecting,
            hop: None,
            committed: None,
            target: Generation::TERMINAL,
            hops: 0,
        }
    }

    /// Stop at `target` instead of the terminal generation
    pub fn with_target(mut self, target: Generation) -> Self {
        self.target = target;
        self
    }

    /// Share an existing cancellation flag instead of a fresh one
    pub fn with_abort(mut self, abort: MergeAbort) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_deletion_policy(mut self, policy: fn() -> Box<dyn IndexDeletionPolicy>) -> Self {
        self.deletion_policy = policy;
        self
    }

    pub fn state(&self) -> UpgradeState {
        self.state
    }

    /// Number of generation hops committed so far
    pub fn hops(&self) -> usize {
        self.hops
    }

    /// Handle that stops the running merge at its next document
    pub fn abort_handle(&self) -> MergeAbort {
        self.abort.clone()
    }

    /// Upgrade until the index reaches the target generation.
    ///
    /// Holds the directory's write lock for the whole run. On failure the
    /// error carries the generation of the last durable commit.
    pub fn run(&mut self) -> std::result::Result<Generation, UpgradeError> {
        let lock = self
            .dir
            .obtain_lock(WRITE_LOCK_NAME)
            .map_err(|e| UpgradeError::new(None, e))?;
        debug!("holding {}", lock.name());

        loop {
            if let UpgradeState::Done(generation) = self.state {
                info!("index is at {} after {} hops", generation, self.hops);
                return Ok(generation);
            }
            if let Err(e) = self.step() {
                let generation = self.committed;
                warn!("upgrade failed while {}: {}", self.state, e);
                self.rollback();
                self.state = UpgradeState::Detecting;
                return Err(UpgradeError::new(generation, e));
            }
        }
    }

    /// Perform one state transition
    fn step(&mut self) -> Result<()> {
        self.abort.check("upgrade")?;
        let next = match self.state {
            UpgradeState::Detecting => {
                let generation = detector::detect(self.dir.as_ref())?;
                self.committed = Some(generation);
                if generation >= self.target {
                    UpgradeState::Done(generation)
                } else {
                    UpgradeState::Reading(generation)
                }
            }
            UpgradeState::Reading(generation) => {
                let to = generation
                    .next()
                    .ok_or_else(|| Error::invalid_state(format!("{} has no successor", generation)))?;
                self.hop = Some(self.read(generation, to)?);
                UpgradeState::Merging { from: generation, to }
            }
            UpgradeState::Merging { to, .. } => {
                self.merge_all()?;
                UpgradeState::Committing(to)
            }
            UpgradeState::Committing(_) => {
                self.commit()?;
                UpgradeState::Detecting
            }
            UpgradeState::Done(generation) => UpgradeState::Done(generation),
        };
        info!("{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn read(&self, from: Generation, to: Generation) -> Result<Hop> {
        let codec = codec_for(from);
        let file_name = detector::latest_commit_file(self.dir.as_ref())?;
        let infos = codec.read_commit(self.dir.as_ref(), &file_name)?;
        let deleter = IndexFileDeleter::open(self.dir.clone(), (self.deletion_policy)(), Some(&infos))?
            .with_retry_warn_threshold(self.config.delete_retry_warn_threshold);
        let segment_generations = infos.segments.iter().map(|s| (s.name.clone(), from)).collect();
        info!(
            "read {}: {} segments, {} live docs",
            file_name,
            infos.len(),
            infos.total_docs()
        );
        Ok(Hop { from, to, infos, deleter, segment_generations })
    }

    /// Run forced merges until one segment in the target layout remains
    fn merge_all(&mut self) -> Result<()> {
        let hop = self.hop.as_mut().ok_or_else(|| Error::invalid_state("merging without a read commit"))?;
        loop {
            let mut stats = Vec::with_capacity(hop.infos.len());
            for info in &hop.infos.segments {
                let generation = hop.segment_generations.get(&info.name).copied().unwrap_or(hop.from);
                stats.push(SegmentStats::collect(self.dir.as_ref(), info, generation)?);
            }
            let Some(plan) = self.policy.find_forced_merges(&stats, 1, hop.to) else {
                return Ok(());
            };
            for merge in &plan.merges {
                run_merge(self.dir.as_ref(), &self.config, &self.abort, hop, merge)?;
            }
            hop.deleter.checkpoint(&hop.infos, false)?;
        }
    }

    fn commit(&mut self) -> Result<()> {
        let mut hop = self.hop.take().ok_or_else(|| Error::invalid_state("committing without a merged commit"))?;
        let codec = codec_for(hop.to);
        hop.infos.user_data.insert(UPGRADED_FROM_KEY.to_string(), hop.from.to_string());
        hop.infos
            .user_data
            .insert(UPGRADED_AT_KEY.to_string(), chrono::Utc::now().to_rfc3339());
        let name = match codec.write_commit(self.dir.as_ref(), &mut hop.infos) {
            Ok(name) => name,
            Err(e) => {
                self.hop = Some(hop);
                return Err(e);
            }
        };

        // the commit is durable: its files must outlive any failure below
        self.hops += 1;
        self.committed = Some(hop.to);
        info!("committed {} as {}", name, hop.to);
        match hop.deleter.checkpoint(&hop.infos, true) {
            Ok(()) => hop.deleter.close(),
            Err(e) => {
                warn!("{} is durable but older files were not released: {}", name, e);
                Ok(())
            }
        }
    }

    /// Drop everything written by an unfinished hop
    fn rollback(&mut self) {
        let Some(hop) = self.hop.take() else {
            return;
        };
        if let Err(e) = hop.deleter.refresh(None).and_then(|_| hop.deleter.close()) {
            warn!("cleanup after failed hop {} -> {}: {}", hop.from, hop.to, e);
        }
    }
}

/// Merge the segments named by `merge` and swap the result into the hop
fn run_merge(
    dir: &dyn Directory,
    config: &UpgradeConfig,
    abort: &MergeAbort,
    hop: &mut Hop,
    merge: &OneMerge,
) -> Result<()> {
    // commit order, so merged doc ids keep the relative order of the sources
    let mut readers: Vec<SegmentReader> = Vec::with_capacity(merge.segments.len());
    for info in hop.infos.segments.iter().filter(|s| merge.segments.contains(&s.name)) {
        let generation = hop.segment_generations.get(&info.name).copied().unwrap_or(hop.from);
        readers.push(codec_for(generation).open_segment(dir, info, config)?);
    }
    if readers.len() != merge.segments.len() {
        return Err(Error::invalid_state(format!("merge names unknown segments in {:?}", merge.segments)));
    }

    let new_name = hop.infos.new_segment_name();
    info!("merging {:?} into {} ({})", merge.segments, new_name, hop.to);
    let merged = match codec_for(hop.to).write_segment(dir, &new_name, &readers, abort) {
        Ok(merged) => merged,
        Err(e) => {
            if let Err(cleanup) = hop.deleter.refresh(Some(&new_name)) {
                warn!("removing partial segment {}: {}", new_name, cleanup);
            }
            return Err(e);
        }
    };
    drop(readers);

    let position = hop
        .infos
        .segments
        .iter()
        .position(|s| merge.segments.contains(&s.name))
        .unwrap_or(hop.infos.segments.len());
    hop.infos.segments.retain(|s| !merge.segments.contains(&s.name));
    let position = position.min(hop.infos.segments.len());
    for name in &merge.segments {
        hop.segment_generations.remove(name);
    }
    hop.segment_generations.insert(merged.name.clone(), hop.to);
    hop.infos.segments.insert(position, merged);
    Ok(())
}

/// Upgrade the index in the filesystem directory at `path` to the terminal
/// generation with default settings
pub fn upgrade(path: impl AsRef<Path>) -> std::result::Result<Generation, UpgradeError> {
    upgrade_with_config(path, UpgradeConfig::default())
}

pub fn upgrade_with_config(
    path: impl AsRef<Path>,
    config: UpgradeConfig,
) -> std::result::Result<Generation, UpgradeError> {
    config.validate().map_err(|e| UpgradeError::new(None, e))?;
    let dir = FsDirectory::open(path.as_ref()).map_err(|e| UpgradeError::new(None, e))?;
    IndexUpgrader::new(Arc::new(dir), config).run()
}

/// Generation of the index at `path`, without modifying it
pub fn detect(path: impl AsRef<Path>) -> std::result::Result<Generation, UpgradeError> {
    let dir = FsDirectory::open(path.as_ref()).map_err(|e| UpgradeError::new(None, e))?;
    detector::detect(&dir).map_err(|e| UpgradeError::new(None, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use crate::core::error::ErrorKind;
    use crate::core::types::{Document, FieldValue};
    use crate::index::builder::SegmentBuilder;
    use crate::index::deletion_policy::CommitPoint;
    use crate::index::term::Term;
    use crate::store::directory::DirectoryLock;
    use crate::store::{IndexInput, RamDirectory};

    /// Raises the abort flag as soon as the upgrade writes its first
    /// segment file, so the following merge of the round is cancelled
    struct AbortOnFirstWrite {
        inner: RamDirectory,
        abort: MergeAbort,
        written: Mutex<Vec<String>>,
    }

    impl Directory for AbortOnFirstWrite {
        fn list_all(&self) -> Result<Vec<String>> {
            self.inner.list_all()
        }

        fn file_exists(&self, name: &str) -> bool {
            self.inner.file_exists(name)
        }

        fn file_length(&self, name: &str) -> Result<u64> {
            self.inner.file_length(name)
        }

        fn open_input(&self, name: &str) -> Result<IndexInput> {
            self.inner.open_input(name)
        }

        fn write_file(&self, name: &str, data: Vec<u8>) -> Result<()> {
            self.inner.write_file(name, data)?;
            if name.starts_with('_') {
                self.written.lock().push(name.to_string());
                self.abort.abort();
            }
            Ok(())
        }

        fn delete_file(&self, name: &str) -> Result<()> {
            self.inner.delete_file(name)
        }

        fn rename(&self, from: &str, to: &str) -> Result<()> {
            self.inner.rename(from, to)
        }

        fn sync_metadata(&self) -> Result<()> {
            self.inner.sync_metadata()
        }

        fn obtain_lock(&self, name: &str) -> Result<Box<dyn DirectoryLock>> {
            self.inner.obtain_lock(name)
        }
    }

    /// Keeps every commit but fails whenever a new one is reported
    struct RefuseCommits;

    impl IndexDeletionPolicy for RefuseCommits {
        fn on_init(&mut self, _commits: &mut [CommitPoint]) -> Result<()> {
            Ok(())
        }

        fn on_commit(&mut self, _commits: &mut [CommitPoint]) -> Result<()> {
            Err(Error::invalid_state("commit refused"))
        }
    }

    fn refuse_commits() -> Box<dyn IndexDeletionPolicy> {
        Box::new(RefuseCommits)
    }

    fn build_index(dir: &RamDirectory, generation: Generation, segments: usize) {
        let mut infos = SegmentInfos::new(generation);
        for s in 0..segments {
            let mut builder = SegmentBuilder::new(generation);
            for i in 0..20 {
                let doc = Document::new()
                    .with_field("id", FieldValue::Stored(format!("{}-{}", s, i).into_bytes()))
                    .with_field("body", FieldValue::Text(format!("shared s{} d{}", s, i)));
                builder.add_document(&doc).unwrap();
            }
            builder.add_to(dir, &mut infos).unwrap();
        }
        codec_for(generation).write_commit(dir, &mut infos).unwrap();
    }

    #[test]
    fn upgrades_through_every_generation() {
        let dir = Arc::new(RamDirectory::new());
        build_index(&dir, Generation::V2, 3);
        let mut upgrader = IndexUpgrader::new(dir.clone(), UpgradeConfig::default());
        assert_eq!(upgrader.run().unwrap(), Generation::V5);
        assert_eq!(upgrader.hops(), 3);
        assert_eq!(upgrader.state(), UpgradeState::Done(Generation::V5));

        let infos = SegmentInfos::read_latest(dir.as_ref()).unwrap();
        assert_eq!(infos.format, Generation::V5);
        assert_eq!(infos.generation, 4);
        assert_eq!(infos.segments.len(), 1);
        assert_eq!(infos.user_data.get(UPGRADED_FROM_KEY).map(String::as_str), Some("V4"));

        let reader = codec_for(Generation::V5)
            .open_segment(dir.as_ref(), &infos.segments[0], &UpgradeConfig::default())
            .unwrap();
        assert_eq!(reader.num_docs(), 60);
        let shared = reader.term_postings(&Term::new("body", "shared")).unwrap().unwrap();
        assert_eq!(shared.doc_freq(), 60);

        // only the last commit and its segment survive
        let files = dir.list_all().unwrap();
        let mut expected = infos.files(true);
        expected.sort();
        let mut index_files: Vec<String> =
            files.into_iter().filter(|f| crate::index::file_names::is_index_file(f)).collect();
        index_files.sort();
        assert_eq!(index_files, expected);
    }

    #[test]
    fn terminal_index_is_left_alone() {
        let dir = Arc::new(RamDirectory::new());
        build_index(&dir, Generation::V5, 2);
        let before = dir.list_all().unwrap();
        let mut upgrader = IndexUpgrader::new(dir.clone(), UpgradeConfig::default());
        assert_eq!(upgrader.run().unwrap(), Generation::V5);
        assert_eq!(upgrader.hops(), 0);
        assert_eq!(dir.list_all().unwrap().len(), before.len());
    }

    #[test]
    fn abort_keeps_source_commit() {
        let dir = Arc::new(RamDirectory::new());
        build_index(&dir, Generation::V3, 2);
        let before = SegmentInfos::read_latest(dir.as_ref()).unwrap();
        let mut upgrader = IndexUpgrader::new(dir.clone(), UpgradeConfig::default());
        upgrader.abort_handle().abort();
        let err = upgrader.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aborted);
        assert_eq!(err.generation, None);

        let after = SegmentInfos::read_latest(dir.as_ref()).unwrap();
        assert_eq!(after, before);
        assert_eq!(detector::detect(dir.as_ref()).unwrap(), Generation::V3);
    }

    #[test]
    fn corrupt_segment_fails_the_hop() {
        let dir = Arc::new(RamDirectory::new());
        build_index(&dir, Generation::V4, 2);
        let before = SegmentInfos::read_latest(dir.as_ref()).unwrap();
        let fdx = format!("{}.fdx", before.segments[1].name);
        let mut bytes = dir.read_all(&fdx).unwrap();
        bytes.truncate(bytes.len() - 8);
        dir.overwrite(&fdx, bytes);

        let err = IndexUpgrader::new(dir.clone(), UpgradeConfig::default()).run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptIndex);
        assert_eq!(err.generation, Some(Generation::V4));
        assert_eq!(SegmentInfos::read_latest(dir.as_ref()).unwrap(), before);
        for file in before.files(true) {
            assert!(dir.file_exists(&file), "{} was removed", file);
        }
        assert!(!dir.list_all().unwrap().iter().any(|f| f.starts_with("_2.")));
    }

    #[test]
    fn abort_mid_merge_removes_partial_output() {
        let inner = RamDirectory::new();
        build_index(&inner, Generation::V3, 4);
        let before = SegmentInfos::read_latest(&inner).unwrap();
        let abort = MergeAbort::new();
        let dir = Arc::new(AbortOnFirstWrite { inner, abort: abort.clone(), written: Mutex::new(Vec::new()) });

        // two merges per round: the first completes, the second is cancelled
        let mut config = UpgradeConfig::default();
        config.merge_policy.max_merge_at_once_explicit = 2;
        let mut upgrader = IndexUpgrader::new(dir.clone(), config).with_abort(abort.clone());
        let err = upgrader.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aborted);
        assert_eq!(err.generation, Some(Generation::V3));
        assert_eq!(upgrader.hops(), 0);

        let written = dir.written.lock().clone();
        assert!(!written.is_empty());
        for file in &written {
            assert!(!dir.file_exists(file), "partial file {} left behind", file);
        }
        assert_eq!(SegmentInfos::read_latest(dir.as_ref()).unwrap(), before);
        for file in before.files(true) {
            assert!(dir.file_exists(&file), "{} was removed", file);
        }

        // a fresh run with its own flag finishes the job
        let mut retry = IndexUpgrader::new(dir.clone(), UpgradeConfig::default());
        assert_eq!(retry.run().unwrap(), Generation::V5);
        let latest = SegmentInfos::read_latest(dir.as_ref()).unwrap();
        let reader = codec_for(Generation::V5)
            .open_segment(dir.as_ref(), &latest.segments[0], &UpgradeConfig::default())
            .unwrap();
        assert_eq!(reader.num_docs(), 80);
    }

    #[test]
    fn durable_commit_is_kept_when_the_deletion_policy_fails() {
        let dir = Arc::new(RamDirectory::new());
        build_index(&dir, Generation::V4, 2);
        let mut upgrader =
            IndexUpgrader::new(dir.clone(), UpgradeConfig::default()).with_deletion_policy(refuse_commits);
        assert_eq!(upgrader.run().unwrap(), Generation::V5);
        assert_eq!(upgrader.hops(), 1);

        let infos = SegmentInfos::read_latest(dir.as_ref()).unwrap();
        assert_eq!(infos.format, Generation::V5);
        for file in infos.files(true) {
            assert!(dir.file_exists(&file), "{} of the new commit was removed", file);
        }
        let reader = codec_for(Generation::V5)
            .open_segment(dir.as_ref(), &infos.segments[0], &UpgradeConfig::default())
            .unwrap();
        assert_eq!(reader.num_docs(), 40);
    }
}
