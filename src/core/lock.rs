//! Distribution lock management
//!
//! Provides an exclusive, cross-process lock per cached distribution so that
//! concurrent wrapper invocations install it one at a time.

use crate::core::error::InstallError;
use crate::core::output;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default upper bound on waiting for another process to finish installing
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(15 * 60);

const INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Lock file path for a distribution directory: a `.lock` sibling.
///
/// The lock lives next to the directory, not inside it, so the directory can
/// be deleted and rebuilt while the lock is held.
pub fn lock_path_for(distribution_dir: &Path) -> PathBuf {
    let mut name = distribution_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "distribution".into());
    name.push(".lock");
    distribution_dir.with_file_name(name)
}

/// Acquire the exclusive lock for a distribution directory, waiting up to `timeout`.
///
/// Returns a guard that releases the lock when dropped.
pub fn acquire_distribution_lock(
    distribution_dir: &Path,
    timeout: Duration,
) -> Result<DistributionLock, InstallError> {
    let lock_path = lock_path_for(distribution_dir);
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(InstallError::io("cannot create directory", parent))?;
    }

    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(InstallError::io("cannot create lock file", &lock_path))?;

    wait_for_lock(&lock_path, timeout, || lock_file.try_lock_exclusive())?;

    Ok(DistributionLock {
        file: lock_file,
        path: lock_path,
    })
}

/// Retry `try_lock` with back-off while the lock is held elsewhere.
///
/// Any failure other than contention is returned at once.
fn wait_for_lock(
    lock_path: &Path,
    timeout: Duration,
    mut try_lock: impl FnMut() -> io::Result<()>,
) -> Result<(), InstallError> {
    let started = Instant::now();
    let mut backoff = INITIAL_BACKOFF;
    let mut announced = false;

    loop {
        match try_lock() {
            Ok(()) => return Ok(()),
            Err(e) if is_contended(&e) => {}
            Err(e) => return Err(InstallError::io("cannot lock", lock_path)(e)),
        }

        let waited = started.elapsed();
        if waited >= timeout {
            return Err(InstallError::LockTimeout {
                lock: lock_path.to_path_buf(),
                waited,
            });
        }
        if !announced {
            output::info(&format!(
                "waiting for another process to finish installing ({})",
                lock_path.display()
            ));
            announced = true;
        }
        std::thread::sleep(backoff.min(timeout - waited));
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// RAII guard for a distribution lock - releases the lock when dropped.
///
/// The lock file stays on disk: unlinking it while another process waits on
/// the same inode would let a third process lock a fresh file concurrently.
#[derive(Debug)]
pub struct DistributionLock {
    file: File,
    path: PathBuf,
}

impl DistributionLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DistributionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
