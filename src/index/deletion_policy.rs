use std::collections::BTreeMap;
use crate::core::error::Result;
use crate::index::commit::SegmentInfos;

/// A commit as seen by the deletion policy
#[derive(Debug, Clone)]
pub struct CommitPoint {
    pub segments_file_name: String,
    pub generation: u64,
    /// Files of the commit, the commit file itself included
    pub files: Vec<String>,
    pub user_data: BTreeMap<String, String>,
    deleted: bool,
}

impl CommitPoint {
    pub fn from_infos(infos: &SegmentInfos) -> Self {
        CommitPoint {
            segments_file_name: infos.segments_file_name(),
            generation: infos.generation,
            files: infos.files(true),
            user_data: infos.user_data.clone(),
            deleted: false,
        }
    }

    /// Ask the deleter to drop this commit once the policy returns
    pub fn delete(&mut self) {
        self.deleted = true;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Decides which commits survive. Commits are passed oldest first.
pub trait IndexDeletionPolicy: Send {
    /// Called once when the deleter opens with every commit found on disk
    fn on_init(&mut self, commits: &mut [CommitPoint]) -> Result<()>;

    /// Called after every new commit
    fn on_commit(&mut self, commits: &mut [CommitPoint]) -> Result<()>;
}

/// Default policy: only the newest commit is kept
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepOnlyLastCommitPolicy;

impl IndexDeletionPolicy for KeepOnlyLastCommitPolicy {
    fn on_init(&mut self, commits: &mut [CommitPoint]) -> Result<()> {
        self.on_commit(commits)
    }

    fn on_commit(&mut self, commits: &mut [CommitPoint]) -> Result<()> {
        if let Some((_, older)) = commits.split_last_mut() {
            older.iter_mut().for_each(CommitPoint::delete);
        }
        Ok(())
    }
}

/// Never deletes a commit
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepAllCommitsPolicy;

impl IndexDeletionPolicy for KeepAllCommitsPolicy {
    fn on_init(&mut self, _commits: &mut [CommitPoint]) -> Result<()> {
        Ok(())
    }

    fn on_commit(&mut self, _commits: &mut [CommitPoint]) -> Result<()> {
        Ok(())
    }
}
