//! Advisory per-partition locks.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::layout::RawLayout;

/// Exclusive advisory lock on one `(endpoint, subject)` unit.
///
/// Held until dropped. Acquisition never blocks: a lock held by another run
/// yields [`StoreError::LockHeld`].
#[derive(Debug)]
pub struct PartitionLock {
    file: File,
    path: PathBuf,
}

impl PartitionLock {
    pub fn acquire(layout: &RawLayout, endpoint_name: &str, subject: &str) -> StoreResult<Self> {
        Self::acquire_path(&layout.lock_path(endpoint_name, subject))
    }

    pub fn acquire_path(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };

            if result != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Err(StoreError::LockHeld {
                        path: path.to_path_buf(),
                    });
                }
                return Err(StoreError::io(path, err));
            }
        }

        // Record the holder's PID for operators.
        file.set_len(0).map_err(|e| StoreError::io(path, e))?;
        let mut writer = &file;
        let _ = writer.write_all(format!("{}", std::process::id()).as_bytes());
        let _ = writer.flush();

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PartitionLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        // The lock file stays; unlinking it would let two runs lock different inodes.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn test_second_acquire_is_refused() {
        let dir = TempDir::new().unwrap();
        let layout = RawLayout::new(dir.path());
        let first = PartitionLock::acquire(&layout, "CASH_FLOW", "IBM").unwrap();
        assert!(first.path().ends_with(".locks/CASH_FLOW/IBM.lock"));
        let second = PartitionLock::acquire(&layout, "CASH_FLOW", "IBM");
        assert!(matches!(second, Err(StoreError::LockHeld { .. })));
        drop(first);
        assert!(PartitionLock::acquire(&layout, "CASH_FLOW", "IBM").is_ok());
    }

    #[test]
    fn test_distinct_units_do_not_conflict() {
        let dir = TempDir::new().unwrap();
        let layout = RawLayout::new(dir.path());
        let _a = PartitionLock::acquire(&layout, "CASH_FLOW", "IBM").unwrap();
        let _b = PartitionLock::acquire(&layout, "CASH_FLOW", "MSFT").unwrap();
    }
}
