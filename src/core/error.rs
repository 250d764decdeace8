//! Error types for loading, downloading and installing a distribution.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading the wrapper properties file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("wrapper properties file '{}' does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("could not load wrapper properties from '{}'", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not load wrapper properties from '{}'", path.display())]
    MissingKey {
        path: PathBuf,
        #[source]
        source: MissingKeyError,
    },

    #[error("invalid distributionUrl '{value}' in '{}'", path.display())]
    InvalidUrl {
        path: PathBuf,
        value: String,
        #[source]
        source: url::ParseError,
    },
}

impl ConfigError {
    /// Path of the properties file the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound { path }
            | Self::Unreadable { path, .. }
            | Self::MissingKey { path, .. }
            | Self::InvalidUrl { path, .. } => path,
        }
    }

    /// Name of the mandatory key that was absent, if that is what failed.
    pub fn missing_key(&self) -> Option<&str> {
        match self {
            Self::MissingKey { source, .. } => Some(source.key),
            _ => None,
        }
    }
}

/// Nested cause of [`ConfigError::MissingKey`].
#[derive(Error, Debug)]
#[error("no value with key '{key}' specified in wrapper properties file '{}'", path.display())]
pub struct MissingKeyError {
    pub key: &'static str,
    pub path: PathBuf,
}

/// Errors raised while fetching a distribution archive.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("could not fetch {url}")]
    Network {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("server returned HTTP {code} {reason} for {url}")]
    Status {
        url: String,
        code: u16,
        reason: String,
    },

    #[error("download of {url} was interrupted after {received} bytes")]
    Interrupted {
        url: String,
        received: u64,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{url} returned '{content_type}' instead of an archive (login or error page?)"
    )]
    UnexpectedContent { url: String, content_type: String },

    #[error("unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("cannot write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while installing a distribution.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("distribution archive {} is empty or contains no entries", archive.display())]
    EmptyArchive { archive: PathBuf },

    #[error("{} is not a supported archive ({reason})", archive.display())]
    NotAnArchive { archive: PathBuf, reason: String },

    #[error("cannot extract {}: {reason}", archive.display())]
    CorruptArchive { archive: PathBuf, reason: String },

    #[error(
        "distribution '{url}' does not contain any directories. Expected to find exactly 1 directory."
    )]
    NoRootDirectory { url: String },

    #[error(
        "distribution '{url}' contains too many directories ({found}). Expected to find exactly 1 directory."
    )]
    MultipleRootDirectories { url: String, found: usize },

    #[error(
        "SHA-256 checksum mismatch for {}\n  expected: {expected}\n  got:      {actual}",
        archive.display()
    )]
    ChecksumMismatch {
        archive: PathBuf,
        expected: String,
        actual: String,
    },

    #[error(
        "timed out after {}s waiting for lock {} held by another process",
        waited.as_secs(),
        lock.display()
    )]
    LockTimeout { lock: PathBuf, waited: Duration },

    #[error("{action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_missing_key_nested_cause() {
        let err = ConfigError::MissingKey {
            path: PathBuf::from("/w/wrapper.properties"),
            source: MissingKeyError {
                key: "distributionUrl",
                path: PathBuf::from("/w/wrapper.properties"),
            },
        };
        assert_eq!(
            err.to_string(),
            "could not load wrapper properties from '/w/wrapper.properties'"
        );
        assert_eq!(err.missing_key(), Some("distributionUrl"));
        assert_eq!(
            err.source().unwrap().to_string(),
            "no value with key 'distributionUrl' specified in wrapper properties file '/w/wrapper.properties'"
        );
    }

    #[test]
    fn test_install_error_wraps_download_error_transparently() {
        let err: InstallError = DownloadError::Status {
            url: "https://example.com/a.zip".into(),
            code: 404,
            reason: "Not Found".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "server returned HTTP 404 Not Found for https://example.com/a.zip"
        );
    }

    #[test]
    fn test_io_helper_keeps_path_and_action() {
        let err = InstallError::io("cannot create directory", "/tmp/x")(std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "cannot create directory /tmp/x");
        assert!(err.source().unwrap().to_string().contains("boom"));
    }
}
