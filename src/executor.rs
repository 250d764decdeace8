//! Ties a wrapper properties file to an installer.

use crate::config::WrapperConfiguration;
use crate::core::error::{ConfigError, InstallError};
use crate::install::Install;
use std::path::{Path, PathBuf};
use url::Url;

/// A loaded wrapper configuration, ready to be installed.
#[derive(Debug, Clone)]
pub struct WrapperExecutor {
    properties_file: PathBuf,
    configuration: WrapperConfiguration,
}

impl WrapperExecutor {
    /// Load the configuration from `properties_file`.
    pub fn for_properties_file(properties_file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let properties_file = properties_file.as_ref().to_path_buf();
        let configuration = WrapperConfiguration::load(&properties_file)?;
        Ok(Self {
            properties_file,
            configuration,
        })
    }

    /// Replace the distribution URL, keeping every other setting.
    pub fn with_distribution(self, distribution: Url) -> Self {
        Self {
            configuration: self.configuration.with_distribution(distribution),
            ..self
        }
    }

    pub fn properties_file(&self) -> &Path {
        &self.properties_file
    }

    pub fn distribution(&self) -> &Url {
        self.configuration.distribution()
    }

    pub fn configuration(&self) -> &WrapperConfiguration {
        &self.configuration
    }

    /// Install the configured distribution and return its root directory.
    pub fn execute(&self, installer: &dyn Install) -> Result<PathBuf, InstallError> {
        installer.install(&self.configuration)
    }
}
