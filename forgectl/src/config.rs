//! Per-invocation configuration.
//!
//! One [`ForgeConfig`] value is built at startup and passed explicitly to the
//! components that need it. Nothing in this crate reads configuration from
//! globals; a command either receives a config or does not need one.

use std::path::PathBuf;
use std::time::Duration;

use crate::release::asset::Platform;

/// Where installable tarballs come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorLocation {
    /// Remote HTTP mirror, e.g. `https://releases.forgechain.io`.
    Remote(String),
    /// Local filesystem mirror laid out as `<root>/<version>/<archive>`.
    Local(PathBuf),
}

/// Immutable configuration for one forgectl invocation.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// Profile this invocation operates on.
    pub profile_name: String,

    /// Directory holding all profile directories.
    ///
    /// Defaults to `~/.forge`.
    pub base_dir: PathBuf,

    /// Release mirror to resolve and download from.
    pub mirror: MirrorLocation,

    /// Platform tag used to select archives.
    pub platform: Platform,

    /// Hard per-asset download timeout.
    pub download_timeout: Duration,

    /// Attempts per asset before a download is recorded as failed.
    pub retry_budget: u32,

    /// Poll interval for advisory download progress.
    pub progress_interval: Duration,
}

/// Default remote mirror.
pub const DEFAULT_MIRROR_URL: &str = "https://releases.forgechain.io";

impl ForgeConfig {
    /// Create a configuration for the given profile with default settings.
    pub fn new(profile_name: impl Into<String>, platform: Platform) -> Self {
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".forge");

        Self {
            profile_name: profile_name.into(),
            base_dir,
            mirror: MirrorLocation::Remote(DEFAULT_MIRROR_URL.to_string()),
            platform,
            download_timeout: Duration::from_secs(300),
            retry_budget: 3,
            progress_interval: Duration::from_millis(500),
        }
    }

    /// Set the base directory holding profiles.
    pub fn with_base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = path.into();
        self
    }

    /// Point at a remote HTTP mirror.
    pub fn with_remote_mirror(mut self, url: impl Into<String>) -> Self {
        self.mirror = MirrorLocation::Remote(url.into());
        self
    }

    /// Point at a local filesystem mirror.
    pub fn with_local_mirror(mut self, path: impl Into<PathBuf>) -> Self {
        self.mirror = MirrorLocation::Local(path.into());
        self
    }

    /// Set the per-asset download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set the retry budget for transient download failures.
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget.max(1);
        self
    }

    /// Directory of the configured profile.
    pub fn profile_dir(&self) -> PathBuf {
        self.base_dir.join(&self.profile_name)
    }
}
