use std::collections::HashMap;
use std::sync::Arc;
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::commit::SegmentInfos;
use crate::index::deletion_policy::{CommitPoint, IndexDeletionPolicy};
use crate::index::file_names::{self, generation_from_segments_file_name, is_commit_file, is_index_file};
use crate::store::directory::Directory;

const DEFAULT_RETRY_WARN_THRESHOLD: usize = 10;

struct PendingDelete {
    name: String,
    attempts: usize,
}

struct DeleterState {
    ref_counts: HashMap<String, u32>,
    /// Live commits, oldest first
    commits: Vec<CommitPoint>,
    /// Files of the last non-commit checkpoint
    last_files: Vec<String>,
    pending: Vec<PendingDelete>,
    policy: Box<dyn IndexDeletionPolicy>,
    closed: bool,
}

/// Reference counts every index file across live commits and deletes a file
/// as soon as nothing references it any more.
///
/// A file is referenced once by every live commit that contains it and once
/// by the last non-commit checkpoint. Deletions refused by the directory are
/// queued and retried on every later checkpoint and on close.
pub struct IndexFileDeleter {
    dir: Arc<dyn Directory>,
    state: Mutex<DeleterState>,
    retry_warn_threshold: usize,
}

impl IndexFileDeleter {
    /// Scan `dir`, load every readable commit and apply `policy`.
    ///
    /// `current` is the commit the caller is working from; its files are
    /// protected as the initial checkpoint. Unreadable commits newer than it
    /// are skipped; an unreadable non-empty commit at or below it is an error.
    pub fn open(
        dir: Arc<dyn Directory>,
        policy: Box<dyn IndexDeletionPolicy>,
        current: Option<&SegmentInfos>,
    ) -> Result<Self> {
        let current_generation = current.map(|c| c.generation);
        let mut ref_counts: HashMap<String, u32> = HashMap::new();
        let mut commits = Vec::new();

        let files = dir.list_all()?;
        for name in files.iter().filter(|f| is_index_file(f)) {
            ref_counts.entry(name.clone()).or_insert(0);
            if !is_commit_file(name) {
                continue;
            }
            match SegmentInfos::read(dir.as_ref(), name) {
                Ok(infos) => {
                    let point = CommitPoint::from_infos(&infos);
                    for file in &point.files {
                        if !dir.file_exists(file) {
                            warn!("{} references missing file {}", name, file);
                        }
                        *ref_counts.entry(file.clone()).or_insert(0) += 1;
                    }
                    commits.push(point);
                }
                Err(e) if e.kind == ErrorKind::NotFound => {
                    debug!("commit {} vanished during scan", name);
                }
                Err(e) => {
                    let generation = generation_from_segments_file_name(name).unwrap_or(0);
                    let older = current_generation.is_some_and(|c| generation <= c);
                    if older && dir.file_length(name).unwrap_or(0) > 0 {
                        return Err(e);
                    }
                    warn!("skipping unreadable commit {}: {}", name, e);
                }
            }
        }
        commits.sort_by_key(|c| c.generation);

        let deleter = IndexFileDeleter {
            dir,
            state: Mutex::new(DeleterState {
                ref_counts,
                commits,
                last_files: Vec::new(),
                pending: Vec::new(),
                policy,
                closed: false,
            }),
            retry_warn_threshold: DEFAULT_RETRY_WARN_THRESHOLD,
        };

        {
            let mut state = deleter.state.lock();
            let orphans: Vec<String> = state
                .ref_counts
                .iter()
                .filter(|(_, count)| **count == 0)
                .map(|(name, _)| name.clone())
                .collect();
            for name in orphans {
                debug!("removing unreferenced file {}", name);
                state.ref_counts.remove(&name);
                deleter.delete_file_locked(&mut state, &name);
            }

            let DeleterState { policy, commits, .. } = &mut *state;
            policy.on_init(commits)?;
            deleter.delete_commits_locked(&mut state)?;
        }

        if let Some(current) = current {
            deleter.checkpoint(current, false)?;
        }
        Ok(deleter)
    }

    pub fn with_retry_warn_threshold(mut self, threshold: usize) -> Self {
        self.retry_warn_threshold = threshold.max(1);
        self
    }

    /// Record a new state of the index.
    ///
    /// With `is_commit` the commit file is already durable: the commit joins
    /// the live list and the policy runs. Otherwise the snapshot replaces the
    /// previous non-commit checkpoint.
    pub fn checkpoint(&self, infos: &SegmentInfos, is_commit: bool) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        self.delete_pending_locked(&mut state);

        for file in infos.files(is_commit) {
            Self::inc_ref_locked(&mut state, &file);
        }

        if is_commit {
            state.commits.push(CommitPoint::from_infos(infos));
            let DeleterState { policy, commits, .. } = &mut *state;
            policy.on_commit(commits)?;
            self.delete_commits_locked(&mut state)?;
        } else {
            let previous = std::mem::replace(&mut state.last_files, infos.files(false));
            for file in previous {
                self.dec_ref_locked(&mut state, &file)?;
            }
        }
        Ok(())
    }

    pub fn inc_ref(&self, files: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        for file in files {
            Self::inc_ref_locked(&mut state, file);
        }
        Ok(())
    }

    /// Drop one reference from each file; files reaching zero are deleted
    pub fn dec_ref(&self, files: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        for file in files {
            self.dec_ref_locked(&mut state, file)?;
        }
        Ok(())
    }

    pub fn ref_count(&self, file: &str) -> u32 {
        self.state.lock().ref_counts.get(file).copied().unwrap_or(0)
    }

    /// Whether some commit or checkpoint still references `file`
    pub fn exists(&self, file: &str) -> bool {
        self.ref_count(file) > 0
    }

    /// Generations of the live commits, oldest first
    pub fn commit_generations(&self) -> Vec<u64> {
        self.state.lock().commits.iter().map(|c| c.generation).collect()
    }

    pub fn pending_deletions(&self) -> Vec<String> {
        self.state.lock().pending.iter().map(|p| p.name.clone()).collect()
    }

    /// Delete files that are not referenced by anything, e.g. the output of
    /// an aborted merge. With `segment` set only that segment's files are
    /// considered.
    pub fn refresh(&self, segment: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        for name in self.dir.list_all()? {
            if !is_index_file(&name) || is_commit_file(&name) {
                continue;
            }
            if let Some(segment) = segment {
                if file_names::strip_extension(&name) != segment
                    && !name.starts_with(&format!("{}_", segment))
                {
                    continue;
                }
            }
            if state.ref_counts.get(&name).copied().unwrap_or(0) == 0 {
                debug!("refresh: removing unreferenced file {}", name);
                state.ref_counts.remove(&name);
                self.delete_file_locked(&mut state, &name);
            }
        }
        Ok(())
    }

    /// Delete files that were written but never checkpointed
    pub fn delete_new_files(&self, files: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        for file in files {
            if state.ref_counts.get(file).copied().unwrap_or(0) == 0 {
                state.ref_counts.remove(file);
                self.delete_file_locked(&mut state, file);
            }
        }
        Ok(())
    }

    /// Retry every deletion the directory refused earlier
    pub fn delete_pending_files(&self) {
        let mut state = self.state.lock();
        self.delete_pending_locked(&mut state);
    }

    /// Release the last non-commit checkpoint and retry pending deletions.
    /// Further mutation fails with `InvalidState`.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        let last = std::mem::take(&mut state.last_files);
        for file in last {
            self.dec_ref_locked(&mut state, &file)?;
        }
        self.delete_pending_locked(&mut state);
        state.closed = true;
        if !state.pending.is_empty() {
            warn!("closing with {} files still pending deletion", state.pending.len());
        }
        Ok(())
    }

    fn ensure_open(&self, state: &DeleterState) -> Result<()> {
        if state.closed {
            return Err(Error::invalid_state("index file deleter is closed"));
        }
        Ok(())
    }

    fn inc_ref_locked(state: &mut DeleterState, file: &str) {
        let count = state.ref_counts.entry(file.to_string()).or_insert(0);
        *count += 1;
        trace!("incRef {} -> {}", file, count);
    }

    fn dec_ref_locked(&self, state: &mut DeleterState, file: &str) -> Result<()> {
        let count = match state.ref_counts.get_mut(file) {
            Some(count) if *count > 0 => count,
            _ => {
                return Err(Error::new(
                    ErrorKind::ReferenceCountUnderflow,
                    format!("decRef of {} with no outstanding references", file),
                ));
            }
        };
        *count -= 1;
        trace!("decRef {} -> {}", file, count);
        if *count == 0 {
            state.ref_counts.remove(file);
            self.delete_file_locked(state, file);
        }
        Ok(())
    }

    /// Drop commits the policy marked deleted
    fn delete_commits_locked(&self, state: &mut DeleterState) -> Result<()> {
        let (doomed, live): (Vec<CommitPoint>, Vec<CommitPoint>) =
            std::mem::take(&mut state.commits).into_iter().partition(CommitPoint::is_deleted);
        state.commits = live;
        for commit in doomed {
            info!("removing commit {}", commit.segments_file_name);
            for file in &commit.files {
                self.dec_ref_locked(state, file)?;
            }
        }
        Ok(())
    }

    fn delete_file_locked(&self, state: &mut DeleterState, name: &str) {
        match self.dir.delete_file(name) {
            Ok(()) => {
                debug!("deleted {}", name);
                state.pending.retain(|p| p.name != name);
            }
            Err(e) if e.kind == ErrorKind::NotFound => {
                state.pending.retain(|p| p.name != name);
            }
            Err(e) => {
                match state.pending.iter_mut().find(|p| p.name == name) {
                    Some(pending) => {
                        pending.attempts += 1;
                        if pending.attempts == self.retry_warn_threshold {
                            warn!("{} still undeletable after {} attempts: {}", name, pending.attempts, e);
                        }
                    }
                    None => {
                        debug!("deletion of {} deferred: {}", name, e);
                        state.pending.push(PendingDelete { name: name.to_string(), attempts: 1 });
                    }
                }
            }
        }
    }

    fn delete_pending_locked(&self, state: &mut DeleterState) {
        let names: Vec<String> = state.pending.iter().map(|p| p.name.clone()).collect();
        for name in names {
            // a file re-referenced since it was queued must survive
            if state.ref_counts.get(&name).copied().unwrap_or(0) > 0 {
                state.pending.retain(|p| p.name != name);
                continue;
            }
            trace!("retrying deletion of {}", name);
            self.delete_file_locked(state, &name);
        }
    }
}
