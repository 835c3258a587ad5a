//! Advisory process lock on the segment file
//!
//! A read-write open takes an exclusive `flock(2)`, a read-only open a shared
//! one. Both are non-blocking: if another process holds a conflicting lock
//! the open fails with `AlreadyLocked`. The lock is released when the
//! [`LockedFile`] is dropped.
//!
//! On non-unix targets the file is opened without a process lock.

use chainbase_core::{Error, Result};
use std::fs::File;
use std::path::Path;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::fcntl::{Flock, FlockArg};

/// A segment file holding its advisory lock.
pub struct LockedFile {
    #[cfg(unix)]
    inner: Flock<File>,
    #[cfg(not(unix))]
    inner: File,
}

impl LockedFile {
    /// Lock `file` (which lives at `path`) exclusively or shared.
    #[cfg(unix)]
    pub fn acquire(file: File, path: &Path, exclusive: bool) -> Result<Self> {
        let arg = if exclusive {
            FlockArg::LockExclusiveNonblock
        } else {
            FlockArg::LockSharedNonblock
        };
        match Flock::lock(file, arg) {
            Ok(inner) => Ok(Self { inner }),
            Err((_, Errno::EWOULDBLOCK)) => Err(Error::AlreadyLocked {
                path: path.to_path_buf(),
            }),
            Err((_, errno)) => Err(Error::Io(std::io::Error::from(errno))),
        }
    }

    /// Lock `file` (which lives at `path`) exclusively or shared.
    #[cfg(not(unix))]
    pub fn acquire(file: File, _path: &Path, _exclusive: bool) -> Result<Self> {
        Ok(Self { inner: file })
    }

    /// The locked file
    pub fn file(&self) -> &File {
        &self.inner
    }
}

impl std::fmt::Debug for LockedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedFile").finish_non_exhaustive()
    }
}
