use std::fs::{File, OpenOptions};
use std::path::Path;
use crate::core::error::{Error, ErrorKind, Result};
use crate::store::directory::DirectoryLock;

/// Single writer guarantee: non-blocking exclusive flock on a lock file
pub struct FileLock {
    pub file: File,
    pub name: String,
}

impl FileLock {
    pub fn acquire(dir: &Path, name: &str) -> Result<Self> {
        let lock_path = dir.join(name);

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB};

            let fd = file.as_raw_fd();
            unsafe {
                if flock(fd, LOCK_EX | LOCK_NB) != 0 {
                    return Err(Error::new(
                        ErrorKind::LockObtainFailed,
                        format!("Lock held by another writer: {}", lock_path.display()),
                    ));
                }
            }
        }

        Ok(FileLock { file, name: name.to_string() })
    }
}

impl DirectoryLock for FileLock {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}
