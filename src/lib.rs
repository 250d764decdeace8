//! Bootstrap launcher for build-tool distributions
//!
//! A wrapper script ships a small properties file next to itself. distwrap reads
//! it, downloads the distribution archive it points at into a per-user cache,
//! unpacks it once, and hands back the path of the unpacked distribution so the
//! script can exec the real tool.
//!
//! # Example Properties File
//!
//! ```properties
//! distributionUrl=https://repo.example.org/tool/tool-3.9.6-bin.zip
//! distributionBase=DISTWRAP_USER_HOME
//! distributionPath=wrapper/dists
//! zipStoreBase=DISTWRAP_USER_HOME
//! zipStorePath=wrapper/dists
//! ```
//!
//! # Pipeline
//!
//! 1. [`WrapperConfiguration::load`] parses and validates the properties file
//! 2. [`PathAssembler`] maps the configuration onto cache locations
//! 3. [`Installer`] checks for an existing install, otherwise takes the
//!    per-distribution lock, downloads, verifies, extracts and publishes
//!
//! ```ignore
//! let config = WrapperConfiguration::load(Path::new("wrapper.properties"))?;
//! let installer = Installer::new(Downloader::new(), PathAssembler::new(user_home));
//! let home = installer.install(&config)?;
//! ```
//!
//! # Cache Layout
//!
//! ```text
//! <user home>/wrapper/dists/
//!   tool-3.9.6-bin-<identity>/
//!     tool-3.9.6-bin.zip        # cached archive
//!     tool-3.9.6/               # unpacked distribution (returned path)
//!     .installed                # completion marker, written last
//!   tool-3.9.6-bin-<identity>.lock
//! ```

pub mod config;
pub mod core;
pub mod download;
pub mod executor;
pub mod install;
pub mod paths;

pub use config::WrapperConfiguration;
pub use crate::core::error::{ConfigError, DownloadError, InstallError, MissingKeyError};
pub use crate::core::output;
pub use download::{Credentials, Download, Downloader};
pub use executor::WrapperExecutor;
pub use install::{Install, Installer};
pub use paths::{LocalDistribution, PathAssembler};
