//! Wrapper configuration loaded from the properties file
//!
//! [`WrapperConfiguration::load`] is the only constructor that touches the
//! filesystem; everything downstream works on the returned value.

pub mod properties;

use crate::core::error::{ConfigError, MissingKeyError};
use crate::paths::PathAssembler;
use properties::Properties;
use std::path::{Path, PathBuf};
use url::Url;

pub const DISTRIBUTION_URL_PROPERTY: &str = "distributionUrl";
pub const DISTRIBUTION_BASE_PROPERTY: &str = "distributionBase";
pub const DISTRIBUTION_PATH_PROPERTY: &str = "distributionPath";
pub const ZIP_STORE_BASE_PROPERTY: &str = "zipStoreBase";
pub const ZIP_STORE_PATH_PROPERTY: &str = "zipStorePath";
pub const ALWAYS_DOWNLOAD_PROPERTY: &str = "alwaysDownload";
pub const ALWAYS_UNPACK_PROPERTY: &str = "alwaysUnpack";
pub const DISTRIBUTION_SHA256_PROPERTY: &str = "distributionSha256Sum";

/// Sub-path under the base used for both archives and unpacked distributions
pub const DEFAULT_DISTRIBUTION_PATH: &str = "wrapper/dists";

/// Where to get a distribution from and where to keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperConfiguration {
    distribution: Url,
    distribution_base: String,
    distribution_path: String,
    zip_base: String,
    zip_path: String,
    always_download: bool,
    always_unpack: bool,
    distribution_sha256_sum: Option<String>,
}

impl WrapperConfiguration {
    /// Configuration for `distribution` with every other field at its default.
    pub fn new(distribution: Url) -> Self {
        Self {
            distribution,
            distribution_base: PathAssembler::USER_HOME_MARKER.to_string(),
            distribution_path: DEFAULT_DISTRIBUTION_PATH.to_string(),
            zip_base: PathAssembler::USER_HOME_MARKER.to_string(),
            zip_path: DEFAULT_DISTRIBUTION_PATH.to_string(),
            always_download: false,
            always_unpack: false,
            distribution_sha256_sum: None,
        }
    }

    /// Load and validate a wrapper properties file.
    pub fn load(properties_file: &Path) -> Result<Self, ConfigError> {
        if !properties_file.is_file() {
            return Err(ConfigError::NotFound {
                path: properties_file.to_path_buf(),
            });
        }

        let unreadable = |source| ConfigError::Unreadable {
            path: properties_file.to_path_buf(),
            source,
        };
        let text = std::fs::read_to_string(properties_file).map_err(unreadable)?;
        let props = Properties::parse(&text).map_err(unreadable)?;

        Self::from_properties(&props, properties_file)
    }

    /// Build a configuration from already-parsed properties.
    ///
    /// `properties_file` anchors relative distribution URLs and is named in errors.
    pub fn from_properties(props: &Properties, properties_file: &Path) -> Result<Self, ConfigError> {
        let raw_url = props
            .get_non_blank(DISTRIBUTION_URL_PROPERTY)
            .ok_or_else(|| ConfigError::MissingKey {
                path: properties_file.to_path_buf(),
                source: MissingKeyError {
                    key: DISTRIBUTION_URL_PROPERTY,
                    path: properties_file.to_path_buf(),
                },
            })?;

        let distribution = resolve_distribution_url(raw_url, properties_file)?;
        let defaults = Self::new(distribution);

        let string_or = |key: &str, default: String| {
            props
                .get_non_blank(key)
                .map(str::to_string)
                .unwrap_or(default)
        };

        Ok(Self {
            distribution_base: string_or(DISTRIBUTION_BASE_PROPERTY, defaults.distribution_base),
            distribution_path: string_or(DISTRIBUTION_PATH_PROPERTY, defaults.distribution_path),
            zip_base: string_or(ZIP_STORE_BASE_PROPERTY, defaults.zip_base),
            zip_path: string_or(ZIP_STORE_PATH_PROPERTY, defaults.zip_path),
            always_download: props.get_bool(ALWAYS_DOWNLOAD_PROPERTY),
            always_unpack: props.get_bool(ALWAYS_UNPACK_PROPERTY),
            distribution_sha256_sum: props
                .get_non_blank(DISTRIBUTION_SHA256_PROPERTY)
                .map(str::to_string),
            distribution: defaults.distribution,
        })
    }

    /// Same configuration, fetched from a different URL.
    pub fn with_distribution(&self, distribution: Url) -> Self {
        Self {
            distribution,
            ..self.clone()
        }
    }

    pub fn with_always_download(self, always_download: bool) -> Self {
        Self {
            always_download,
            ..self
        }
    }

    pub fn with_always_unpack(self, always_unpack: bool) -> Self {
        Self {
            always_unpack,
            ..self
        }
    }

    pub fn with_distribution_base(self, base: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            distribution_base: base.into(),
            distribution_path: path.into(),
            ..self
        }
    }

    pub fn with_zip_base(self, base: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            zip_base: base.into(),
            zip_path: path.into(),
            ..self
        }
    }

    pub fn with_sha256_sum(self, sum: impl Into<String>) -> Self {
        Self {
            distribution_sha256_sum: Some(sum.into()),
            ..self
        }
    }

    pub fn distribution(&self) -> &Url {
        &self.distribution
    }

    pub fn distribution_base(&self) -> &str {
        &self.distribution_base
    }

    pub fn distribution_path(&self) -> &str {
        &self.distribution_path
    }

    pub fn zip_base(&self) -> &str {
        &self.zip_base
    }

    pub fn zip_path(&self) -> &str {
        &self.zip_path
    }

    pub fn always_download(&self) -> bool {
        self.always_download
    }

    pub fn always_unpack(&self) -> bool {
        self.always_unpack
    }

    pub fn distribution_sha256_sum(&self) -> Option<&str> {
        self.distribution_sha256_sum.as_deref()
    }
}

/// Resolve a `distributionUrl` value to an absolute URL.
///
/// Values with a scheme are used verbatim. Anything else is a path relative to
/// the properties file's directory (never the working directory).
pub fn resolve_distribution_url(value: &str, properties_file: &Path) -> Result<Url, ConfigError> {
    let invalid = |source| ConfigError::InvalidUrl {
        path: properties_file.to_path_buf(),
        value: value.to_string(),
        source,
    };

    if has_scheme(value) {
        return Url::parse(value).map_err(invalid);
    }

    let base_dir = properties_file.parent().unwrap_or(Path::new(""));
    let relative = value.replace('\\', "/");
    let joined = base_dir.join(relative.trim_start_matches('/'));
    let absolute = std::path::absolute(&joined).map_err(|source| ConfigError::Unreadable {
        path: properties_file.to_path_buf(),
        source,
    })?;

    Url::from_file_path(normalize(&absolute)).map_err(|()| invalid(url::ParseError::RelativeUrlWithoutBase))
}

/// `scheme:` prefix per RFC 3986; single letters are Windows drive letters.
fn has_scheme(value: &str) -> bool {
    let Some((scheme, _)) = value.split_once(':') else {
        return false;
    };
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Lexically drop `.` components and fold `..` onto their parent.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
