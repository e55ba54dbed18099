use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use bytes::Bytes;
use memmap2::Mmap;
use crate::core::error::{Error, ErrorKind, Result};
use crate::store::data_input::IndexInput;
use crate::store::directory::{Directory, DirectoryLock};
use crate::store::lock::FileLock;

/// Directory backed by a filesystem path; reads are memory mapped
#[derive(Debug, Clone)]
pub struct FsDirectory {
    pub base_dir: PathBuf,
}

impl FsDirectory {
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.is_dir() {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("index directory does not exist: {}", base_dir.display()),
            ));
        }
        Ok(FsDirectory { base_dir })
    }

    /// Open, creating the directory first when missing
    pub fn create(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(FsDirectory { base_dir })
    }

    pub fn path(&self) -> &Path {
        &self.base_dir
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }
}

impl Directory for FsDirectory {
    fn list_all(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        Ok(fs::metadata(self.file_path(name))?.len())
    }

    fn open_input(&self, name: &str) -> Result<IndexInput> {
        let file = File::open(self.file_path(name))?;
        let len = file.metadata()?.len();
        if len == 0 {
            // zero-length maps are rejected on some platforms
            return Ok(IndexInput::new(name, Bytes::new()));
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(IndexInput::new(name, Bytes::from_owner(mmap)))
    }

    fn write_file(&self, name: &str, data: Vec<u8>) -> Result<()> {
        let path = self.file_path(name);
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(Error::new(
                ErrorKind::FileInUse,
                format!("cannot delete {}: {}", name, e),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        fs::rename(self.file_path(from), self.file_path(to))?;
        Ok(())
    }

    fn sync_metadata(&self) -> Result<()> {
        #[cfg(unix)]
        {
            File::open(&self.base_dir)?.sync_all()?;
        }
        Ok(())
    }

    fn obtain_lock(&self, name: &str) -> Result<Box<dyn DirectoryLock>> {
        Ok(Box::new(FileLock::acquire(&self.base_dir, name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_read_rename_delete() {
        let temp = TempDir::new().unwrap();
        let dir = FsDirectory::open(temp.path()).unwrap();

        dir.write_file("pending_segments_1", vec![1, 2, 3]).unwrap();
        dir.rename("pending_segments_1", "segments_1").unwrap();
        assert!(!dir.file_exists("pending_segments_1"));
        assert_eq!(dir.file_length("segments_1").unwrap(), 3);

        let mut input = dir.open_input("segments_1").unwrap();
        assert_eq!(input.read_bytes(3).unwrap(), &[1, 2, 3]);

        dir.delete_file("segments_1").unwrap();
        assert!(dir.list_all().unwrap().is_empty());
    }

    #[test]
    fn existing_files_are_never_overwritten() {
        let temp = TempDir::new().unwrap();
        let dir = FsDirectory::open(temp.path()).unwrap();
        dir.write_file("_0.tis", vec![1]).unwrap();
        assert!(dir.write_file("_0.tis", vec![2]).is_err());
    }

    #[test]
    fn second_writer_cannot_take_the_lock() {
        let temp = TempDir::new().unwrap();
        let dir = FsDirectory::open(temp.path()).unwrap();
        let lock = dir.obtain_lock("write.lock").unwrap();
        let err = dir.obtain_lock("write.lock").err().unwrap();
        assert_eq!(err.kind, ErrorKind::LockObtainFailed);
        drop(lock);
        dir.obtain_lock("write.lock").unwrap();
    }

    #[test]
    fn empty_files_open() {
        let temp = TempDir::new().unwrap();
        let dir = FsDirectory::open(temp.path()).unwrap();
        dir.write_file("segments", Vec::new()).unwrap();
        assert!(dir.open_input("segments").unwrap().is_empty());
    }
}
