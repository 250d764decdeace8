//! Fetching distribution archives
//!
//! [`Download`] is the seam the installer depends on. [`Downloader`] is the
//! real implementation: `file:` URLs are copied, `http`/`https` URLs are
//! streamed through ureq. Either way the bytes land in a temporary file next
//! to the destination and are renamed into place only once complete, so a
//! partial archive is never visible under the final name.

pub mod http;
pub mod progress;
pub mod proxy;

use crate::core::error::DownloadError;
use crate::core::output;
use progress::{NoProgress, ProgressObserver, TransferProgress};
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default timeout for connecting and for each individual read.
///
/// Not a deadline for the whole transfer: a download that keeps receiving
/// bytes may run longer.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Copy buffer for local sources
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Fetches the resource at a URL into a file.
pub trait Download: Send + Sync {
    /// Write the content of `source` to `destination`.
    ///
    /// On success `destination` holds the complete content. On failure it is
    /// left untouched.
    fn download(&self, source: &Url, destination: &Path) -> Result<(), DownloadError>;
}

/// HTTP basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

type ProxyEnv = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Downloads over `file:`, `http:` and `https:`.
#[derive(Clone)]
pub struct Downloader {
    credentials: Option<Credentials>,
    timeout: Duration,
    progress: Arc<dyn ProgressObserver>,
    proxy_env: ProxyEnv,
}

impl Default for Downloader {
    fn default() -> Self {
        Self {
            credentials: None,
            timeout: DEFAULT_HTTP_TIMEOUT,
            progress: Arc::new(NoProgress),
            proxy_env: Arc::new(proxy::process_env),
        }
    }
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials sent to HTTP servers; they take precedence over URL userinfo.
    pub fn with_credentials(self, credentials: Option<Credentials>) -> Self {
        Self {
            credentials,
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn with_progress(self, progress: Arc<dyn ProgressObserver>) -> Self {
        Self { progress, ..self }
    }

    /// Replace the environment consulted for proxy settings.
    pub fn with_proxy_env(
        self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            proxy_env: Arc::new(lookup),
            ..self
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn copy_local(&self, source: &Url, out: &mut File, name: &str) -> Result<u64, DownloadError> {
        let path = source
            .to_file_path()
            .map_err(|()| DownloadError::UnsupportedScheme {
                url: source.to_string(),
                scheme: format!("file with host '{}'", source.host_str().unwrap_or("")),
            })?;
        let mut input = File::open(&path).map_err(|e| DownloadError::Io {
            path: path.clone(),
            source: e,
        })?;
        let total = input.metadata().ok().map(|m| m.len());

        let mut progress = TransferProgress::start(self.progress.as_ref(), name, total);
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            let n = input.read(&mut buffer).map_err(|e| DownloadError::Io {
                path: path.clone(),
                source: e,
            })?;
            if n == 0 {
                break;
            }
            out.write_all(&buffer[..n])
                .map_err(|e| DownloadError::Interrupted {
                    url: source.to_string(),
                    received: progress.transferred(),
                    source: e,
                })?;
            progress.record(n);
        }
        Ok(progress.transferred())
    }
}

impl Download for Downloader {
    fn download(&self, source: &Url, destination: &Path) -> Result<(), DownloadError> {
        let name = destination
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "download".to_string());
        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let io_error = |e| DownloadError::Io {
            path: destination.to_path_buf(),
            source: e,
        };

        std::fs::create_dir_all(dir).map_err(io_error)?;
        let mut part = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(io_error)?;

        output::action(&format!("Downloading {}", redacted(source)));

        let received = match source.scheme() {
            "file" => self.copy_local(source, part.as_file_mut(), &name)?,
            "http" | "https" => http::fetch(
                source,
                part.as_file_mut(),
                &name,
                self.credentials.as_ref(),
                self.timeout,
                self.progress.as_ref(),
                self.proxy_env.as_ref(),
            )?,
            other => {
                return Err(DownloadError::UnsupportedScheme {
                    url: redacted(source),
                    scheme: other.to_string(),
                });
            }
        };

        part.as_file_mut().flush().map_err(io_error)?;
        part.as_file().sync_all().map_err(io_error)?;
        part.persist(destination).map_err(|e| io_error(e.error))?;

        output::detail(&format!("downloaded {} ({} bytes)", name, received));
        Ok(())
    }
}

/// URL as safe to print: userinfo removed.
pub fn redacted(url: &Url) -> String {
    http::strip_userinfo(url).0.to_string()
}
