//! Installing a distribution into the local cache
//!
//! [`Installer::install`] runs check, lock, re-check, download, verify,
//! extract and publish. The unlocked check is safe because the install marker
//! is the last thing written and is written atomically.

mod extract;
mod publish;

use crate::config::WrapperConfiguration;
use crate::core::error::InstallError;
use crate::core::{hash, lock, output};
use crate::download::{self, Download, Downloader};
use crate::paths::{LocalDistribution, PathAssembler};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Produces the local directory of a configured distribution.
pub trait Install {
    /// Make the distribution available locally and return its root directory.
    fn install(&self, configuration: &WrapperConfiguration) -> Result<PathBuf, InstallError>;
}

/// Downloads and unpacks distributions under a [`PathAssembler`] root.
#[derive(Debug)]
pub struct Installer<D: Download = Downloader> {
    downloader: D,
    path_assembler: PathAssembler,
    lock_timeout: Duration,
}

impl<D: Download> Installer<D> {
    pub fn new(downloader: D, path_assembler: PathAssembler) -> Self {
        Self {
            downloader,
            path_assembler,
            lock_timeout: lock::DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// How long to wait for another process installing the same distribution.
    pub fn with_lock_timeout(self, lock_timeout: Duration) -> Self {
        Self {
            lock_timeout,
            ..self
        }
    }

    pub fn path_assembler(&self) -> &PathAssembler {
        &self.path_assembler
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    fn fetch(
        &self,
        configuration: &WrapperConfiguration,
        local: &LocalDistribution,
    ) -> Result<(), InstallError> {
        let zip_file = local.zip_file();
        if configuration.always_download() || !zip_file.is_file() {
            self.downloader
                .download(configuration.distribution(), zip_file)?;
        } else {
            output::detail(&format!("using cached archive {}", zip_file.display()));
        }

        let len = std::fs::metadata(zip_file)
            .map_err(InstallError::io("cannot read", zip_file))?
            .len();
        if len == 0 {
            discard(zip_file);
            return Err(InstallError::EmptyArchive {
                archive: zip_file.to_path_buf(),
            });
        }

        if let Some(expected) = configuration.distribution_sha256_sum() {
            hash::verify_sha256(zip_file, expected).inspect_err(|_| discard(zip_file))?;
            output::detail("checksum verified");
        }

        Ok(())
    }

    fn unpack(
        &self,
        configuration: &WrapperConfiguration,
        local: &LocalDistribution,
    ) -> Result<PathBuf, InstallError> {
        let dist_dir = local.distribution_dir();
        let zip_file = local.zip_file();
        let url = download::redacted(configuration.distribution());

        std::fs::create_dir_all(dist_dir)
            .map_err(InstallError::io("cannot create directory", dist_dir))?;
        publish::remove_marker(dist_dir)?;

        let staging = tempfile::Builder::new()
            .prefix(publish::STAGING_PREFIX)
            .tempdir_in(dist_dir)
            .map_err(InstallError::io("cannot create directory in", dist_dir))?;

        output::action(&format!("Unpacking {}", zip_file.display()));
        let entries = extract::extract(zip_file, staging.path()).inspect_err(|e| {
            if matches!(
                e,
                InstallError::EmptyArchive { .. }
                    | InstallError::NotAnArchive { .. }
                    | InstallError::CorruptArchive { .. }
            ) {
                discard(zip_file);
            }
        })?;
        if entries == 0 {
            discard(zip_file);
            return Err(InstallError::EmptyArchive {
                archive: zip_file.to_path_buf(),
            });
        }

        let root_name = publish::single_root(staging.path(), &url)?;
        let unpacked_root = staging.path().join(&root_name);
        publish::make_executable(&unpacked_root)?;

        publish::clear_stale(dist_dir, &[zip_file, staging.path()])?;
        let home = publish::commit(&unpacked_root, dist_dir, &root_name)?;

        output::detail(&format!("installed {} ({} entries)", root_name, entries));
        Ok(home)
    }
}

impl<D: Download> Install for Installer<D> {
    fn install(&self, configuration: &WrapperConfiguration) -> Result<PathBuf, InstallError> {
        let local = self.path_assembler.local_distribution(configuration);
        let dist_dir = local.distribution_dir();
        let reuse = !configuration.always_download() && !configuration.always_unpack();

        if reuse && let Some(home) = publish::installed_home(dist_dir) {
            output::detail(&format!("already installed at {}", home.display()));
            return canonical(&home);
        }

        let _lock = lock::acquire_distribution_lock(dist_dir, self.lock_timeout)?;

        // Whoever held the lock before us may have finished the job.
        if reuse && let Some(home) = publish::installed_home(dist_dir) {
            output::detail(&format!("installed concurrently at {}", home.display()));
            return canonical(&home);
        }

        self.fetch(configuration, &local)?;
        let home = self.unpack(configuration, &local)?;
        output::success(&format!("Distribution ready at {}", home.display()));
        canonical(&home)
    }
}

fn canonical(home: &Path) -> Result<PathBuf, InstallError> {
    dunce::canonicalize(home).map_err(InstallError::io("cannot resolve", home))
}

/// Delete an archive that failed verification so the next run fetches it again.
fn discard(zip_file: &Path) {
    if let Err(e) = std::fs::remove_file(zip_file)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        output::warning(&format!("cannot remove {}: {}", zip_file.display(), e));
    }
}
