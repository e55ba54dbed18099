use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use crate::core::error::{Error, ErrorKind, Result};
use crate::store::data_input::IndexInput;
use crate::store::directory::{Directory, DirectoryLock};

/// In-memory directory.
///
/// Files can be pinned with `hold_open` to mimic another process keeping a
/// file open: deleting a pinned file fails with `FileInUse` until released.
#[derive(Default)]
pub struct RamDirectory {
    files: RwLock<HashMap<String, Bytes>>,
    held_open: Mutex<HashSet<String>>,
    locks: Arc<Mutex<HashSet<String>>>,
    delete_count: Mutex<HashMap<String, usize>>,
}

impl RamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold_open(&self, name: &str) {
        self.held_open.lock().insert(name.to_string());
    }

    pub fn release(&self, name: &str) {
        self.held_open.lock().remove(name);
    }

    /// How many times `name` has been physically deleted
    pub fn deletions_of(&self, name: &str) -> usize {
        self.delete_count.lock().get(name).copied().unwrap_or(0)
    }

    /// Replace a file's bytes in place, bypassing write-once semantics
    pub fn overwrite(&self, name: &str, data: Vec<u8>) {
        self.files.write().insert(name.to_string(), Bytes::from(data));
    }

    pub fn read_all(&self, name: &str) -> Option<Vec<u8>> {
        self.files.read().get(name).map(|b| b.to_vec())
    }
}

impl Directory for RamDirectory {
    fn list_all(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        match self.files.read().get(name) {
            Some(data) => Ok(data.len() as u64),
            None => Err(Error::new(ErrorKind::NotFound, format!("file not found: {}", name))),
        }
    }

    fn open_input(&self, name: &str) -> Result<IndexInput> {
        match self.files.read().get(name) {
            Some(data) => Ok(IndexInput::new(name, data.clone())),
            None => Err(Error::new(ErrorKind::NotFound, format!("file not found: {}", name))),
        }
    }

    fn write_file(&self, name: &str, data: Vec<u8>) -> Result<()> {
        let mut files = self.files.write();
        if files.contains_key(name) {
            return Err(Error::new(ErrorKind::InvalidState, format!("file already exists: {}", name)));
        }
        files.insert(name.to_string(), Bytes::from(data));
        Ok(())
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        if self.held_open.lock().contains(name) {
            return Err(Error::new(ErrorKind::FileInUse, format!("file is open elsewhere: {}", name)));
        }
        match self.files.write().remove(name) {
            Some(_) => {
                *self.delete_count.lock().entry(name.to_string()).or_insert(0) += 1;
                Ok(())
            }
            None => Err(Error::new(ErrorKind::NotFound, format!("file not found: {}", name))),
        }
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.files.write();
        match files.remove(from) {
            Some(data) => {
                files.insert(to.to_string(), data);
                Ok(())
            }
            None => Err(Error::new(ErrorKind::NotFound, format!("file not found: {}", from))),
        }
    }

    fn sync_metadata(&self) -> Result<()> {
        Ok(())
    }

    fn obtain_lock(&self, name: &str) -> Result<Box<dyn DirectoryLock>> {
        let mut locks = self.locks.lock();
        if !locks.insert(name.to_string()) {
            return Err(Error::new(ErrorKind::LockObtainFailed, format!("Lock held by another writer: {}", name)));
        }
        Ok(Box::new(RamLock { name: name.to_string(), locks: self.locks.clone() }))
    }
}

struct RamLock {
    name: String,
    locks: Arc<Mutex<HashSet<String>>>,
}

impl DirectoryLock for RamLock {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for RamLock {
    fn drop(&mut self) {
        self.locks.lock().remove(&self.name);
    }
}
