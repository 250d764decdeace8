//! Cache locations for a configured distribution
//!
//! Pure path arithmetic: no filesystem access, safe to call speculatively.
//! Every distribution gets its own directory named
//! `<artifact>-<identity>` where `identity` is derived from the source URL,
//! so two `tool-1.0.zip` archives from different hosts never share a slot.

use crate::config::WrapperConfiguration;
use crate::core::hash;
use std::path::{Path, PathBuf};
use url::Url;

/// Archive extensions stripped from the file name to form the artifact name.
/// Longest first so `.tar.gz` wins over `.gz`.
const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.gz", ".tar.xz", ".tar.bz2", ".tar.zst", ".tgz", ".txz", ".tbz2", ".tzst", ".zip",
    ".tar",
];

/// Bytes of the SHA-256 digest kept in the identity segment (hex-encoded: 32 chars)
const IDENTITY_BYTES: usize = 16;

/// Where a distribution's archive and unpacked contents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDistribution {
    distribution_dir: PathBuf,
    zip_file: PathBuf,
}

impl LocalDistribution {
    /// Directory holding the unpacked distribution (and the install marker).
    pub fn distribution_dir(&self) -> &Path {
        &self.distribution_dir
    }

    /// Path of the cached archive.
    pub fn zip_file(&self) -> &Path {
        &self.zip_file
    }
}

/// Maps a [`WrapperConfiguration`] onto concrete cache paths under a root directory.
#[derive(Debug, Clone)]
pub struct PathAssembler {
    local_root: PathBuf,
}

impl PathAssembler {
    /// Base value meaning "the per-user cache root"
    pub const USER_HOME_MARKER: &'static str = "DISTWRAP_USER_HOME";

    pub fn new(local_root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Compute the cache paths for `configuration`.
    pub fn local_distribution(&self, configuration: &WrapperConfiguration) -> LocalDistribution {
        let url = configuration.distribution();
        let file_name = dist_file_name(url);
        let dir_name = root_dir_name(&file_name, url);

        let distribution_dir = self
            .base_dir(configuration.distribution_base())
            .join(configuration.distribution_path())
            .join(&dir_name);
        let zip_file = self
            .base_dir(configuration.zip_base())
            .join(configuration.zip_path())
            .join(&dir_name)
            .join(&file_name);

        LocalDistribution {
            distribution_dir,
            zip_file,
        }
    }

    fn base_dir(&self, base: &str) -> PathBuf {
        if base == Self::USER_HOME_MARKER {
            self.local_root.clone()
        } else {
            // Absolute bases replace the root on join.
            self.local_root.join(base)
        }
    }
}

/// Last path segment of the URL, or `distribution` when there is none.
fn dist_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(sanitize_segment)
        .unwrap_or_else(|| "distribution".to_string())
}

/// `<artifact>-<identity>` for a distribution file name and its URL.
fn root_dir_name(file_name: &str, url: &Url) -> String {
    format!("{}-{}", strip_archive_extension(file_name), identity_token(url))
}

fn strip_archive_extension(file_name: &str) -> &str {
    let lower = file_name.to_ascii_lowercase();
    ARCHIVE_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext) && lower.len() > ext.len())
        .map(|ext| &file_name[..file_name.len() - ext.len()])
        .unwrap_or(file_name)
}

/// Deterministic token for a URL; credentials do not take part.
fn identity_token(url: &Url) -> String {
    let mut anonymous = url.clone();
    let _ = anonymous.set_username("");
    let _ = anonymous.set_password(None);
    let digest = hash::sha256_hex(anonymous.as_str());
    digest[..IDENTITY_BYTES * 2].to_string()
}

/// Keep a URL segment usable as a file name on every platform.
fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
