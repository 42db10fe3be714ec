//! Single-invocation exclusivity lock
//!
//! Overlapping bandwidth trials would contend for the interface and corrupt
//! each other's throughput numbers, so at most one invocation may run per
//! host. The lock is an advisory `flock(LOCK_EX | LOCK_NB)` held on an open
//! file descriptor: the kernel releases it on any process exit, including
//! SIGKILL, so a stuck lock cannot survive process death.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// RAII guard for the invocation lock. Dropping the guard (or exiting the
/// process by any path) releases the lock.
#[derive(Debug)]
pub struct RunLock {
    _lock_file: File,
    path: PathBuf,
}

impl RunLock {
    /// Try to acquire the invocation lock without blocking.
    ///
    /// Returns `Ok(Some(guard))` when acquired, `Ok(None)` when another
    /// invocation currently holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        if try_flock_exclusive(&lock_file)? {
            Ok(Some(Self {
                _lock_file: lock_file,
                path: path.to_path_buf(),
            }))
        } else {
            Ok(None)
        }
    }

    /// Path of the lock file backing this guard.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Try to acquire an exclusive flock on a file (non-blocking).
///
/// Returns `Ok(true)` if the lock was acquired, `Ok(false)` if the file is
/// already locked by another process.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: flock is a standard POSIX call; fd is a valid descriptor
        // owned by `file`. LOCK_EX | LOCK_NB is a non-blocking exclusive lock.
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.lock");

        let guard = RunLock::try_acquire(&path).expect("acquire").expect("free");
        assert_eq!(guard.path(), path.as_path());
        drop(guard);

        // Released on drop; a second acquisition must succeed.
        let again = RunLock::try_acquire(&path).expect("acquire");
        assert!(again.is_some());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/locks/run.lock");
        let guard = RunLock::try_acquire(&path).expect("acquire");
        assert!(guard.is_some());
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn second_holder_in_same_process_is_refused() {
        // flock is per open file description, so two separate opens contend
        // even inside one process.
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.lock");

        let first = RunLock::try_acquire(&path).expect("acquire").expect("free");
        let second = RunLock::try_acquire(&path).expect("acquire");
        assert!(second.is_none(), "held lock must not be re-acquired");
        drop(first);

        let third = RunLock::try_acquire(&path).expect("acquire");
        assert!(third.is_some());
    }
}
