use crate::core::error::Result;
use crate::store::data_input::IndexInput;

/// Flat collection of named, write-once files.
///
/// Files are written whole and are immutable afterwards. Listing, deletion and
/// rename are the only metadata operations the index needs; `rename` must be
/// atomic so a commit becomes visible all at once.
pub trait Directory: Send + Sync {
    fn list_all(&self) -> Result<Vec<String>>;

    fn file_exists(&self, name: &str) -> bool;

    fn file_length(&self, name: &str) -> Result<u64>;

    fn open_input(&self, name: &str) -> Result<IndexInput>;

    /// Create `name` with the given contents and make it durable
    fn write_file(&self, name: &str, data: Vec<u8>) -> Result<()>;

    /// Fails with `ErrorKind::FileInUse` when another holder keeps the file open
    fn delete_file(&self, name: &str) -> Result<()>;

    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Make directory metadata (renames, deletes) durable
    fn sync_metadata(&self) -> Result<()>;

    /// Exclusive advisory lock, released when the returned guard drops
    fn obtain_lock(&self, name: &str) -> Result<Box<dyn DirectoryLock>>;
}

pub trait DirectoryLock: Send {
    fn name(&self) -> &str;
}

pub const WRITE_LOCK_NAME: &str = "write.lock";
