//! Advisory file lock guarding one item store.
//!
//! The lock lives in a sibling `<store>.lock` file so that the store itself can
//! be replaced by rename while the lock is held.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::ErrorCode;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("{}: {} still locked after {waited:?}", ErrorCode::LockContention, .path.display())]
    Contended { path: PathBuf, waited: Duration },

    #[error("{}: cannot open lock file {}: {source}", ErrorCode::StoreUnavailable, .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Contended { .. } => ErrorCode::LockContention,
            Self::Io { .. } => ErrorCode::StoreUnavailable,
        }
    }
}

/// Whether a guard admits other holders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Readers; compatible with each other.
    Shared,
    /// A single read-modify-write step.
    Exclusive,
}

/// Held for the whole load/compute/save step so that two processes sharing
/// one item file cannot interleave their rewrites. Unlocks on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
}

impl StoreLock {
    /// Take the lock in `mode`, polling until `timeout` runs out.
    pub fn acquire(path: &Path, timeout: Duration, mode: LockMode) -> Result<Self, LockError> {
        let file = open_lock_file(path).map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let started = Instant::now();
        loop {
            let taken = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            if taken.is_ok() {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                    mode,
                });
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(LockError::Contended {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
