//! Environment variable names and user-home resolution
//!
//! The binary reads these variables and hands the resolved values to the
//! library. Proxy variables are the exception, see `download::proxy`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Property (`-Ddistwrap.user.home=...`) overriding the cache root
pub const USER_HOME_PROPERTY: &str = "distwrap.user.home";

/// Environment variable overriding the cache root
pub const USER_HOME_ENV: &str = "DISTWRAP_USER_HOME";

pub const VERBOSE_ENV: &str = "DISTWRAP_VERBOSE";
pub const USERNAME_ENV: &str = "DISTWRAP_USERNAME";
pub const PASSWORD_ENV: &str = "DISTWRAP_PASSWORD";
pub const REPOURL_ENV: &str = "DISTWRAP_REPOURL";
pub const PROPERTIES_ENV: &str = "DISTWRAP_PROPERTIES";
pub const HTTP_TIMEOUT_ENV: &str = "DISTWRAP_HTTP_TIMEOUT";
pub const LOCK_TIMEOUT_ENV: &str = "DISTWRAP_LOCK_TIMEOUT";

/// Cache directory under the home directory used when nothing overrides it
const DEFAULT_USER_HOME_DIR: &str = ".cache";

/// Resolve the cache root: property, then environment variable, then `<home>/.cache`.
///
/// Returns `None` only when nothing is set and the home directory is unknown.
pub fn resolve_user_home(
    property: Option<&str>,
    env: Option<OsString>,
    home_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(value) = property.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(value));
    }
    if let Some(value) = env.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(value));
    }
    home_dir.map(|home| home.join(DEFAULT_USER_HOME_DIR))
}

/// Parse a seconds value from the environment, clamped to `min..=max`.
pub fn duration_secs(value: Option<OsString>, default: Duration, min: u64, max: u64) -> Duration {
    value
        .and_then(|v| v.to_str().and_then(|s| s.trim().parse::<u64>().ok()))
        .map(|secs| Duration::from_secs(secs.clamp(min, max)))
        .unwrap_or(default)
}
