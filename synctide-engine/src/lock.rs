//! Per-user run lock backed by a directory in the system temp dir.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Holds the run lock; dropping releases it.
///
/// Existence of the directory is the whole protocol: no pid file, no
/// staleness detection. A crashed run can leave the directory behind, in
/// which case the contention warning names the path for manual removal.
#[derive(Debug)]
pub struct RunLock {
    dir: PathBuf,
}

impl RunLock {
    /// Attempt to take the lock. `Ok(None)` means another instance holds
    /// it. Non-blocking; the recurring trigger retries the whole run.
    pub fn acquire(dir: PathBuf) -> io::Result<Option<RunLock>> {
        match fs::create_dir(&dir) {
            Ok(()) => Ok(Some(RunLock { dir })),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                warn!(
                    "lock directory exists; another instance may be running. If not, delete {}",
                    dir.display()
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir(&self.dir) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(lock = %self.dir.display(), error = %err, "could not release run lock");
            }
        }
    }
}
