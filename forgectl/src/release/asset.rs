//! Asset identity and naming conventions.
//!
//! This module is the single source of truth for asset and archive naming:
//! - Binary/component names (e.g. `forge`, `forge-console`)
//! - Archive filenames (e.g. `forge_linux_amd64.tgz`)
//! - Remote catalog paths (e.g. `forge/latest.json`)
//!
//! Assets are a closed, enumerated set resolved at compile time; there is no
//! string-keyed lookup of asset handlers anywhere in the crate.

use std::fmt;
use std::path::PathBuf;

use semver::Version;

use crate::error::ForgeError;

/// One downloadable component of a forge release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// The chain node engine. This is the primary asset: activation of a
    /// release means activating this binary.
    Node,
    /// The bundled web console UI.
    Console,
}

impl AssetKind {
    /// All assets that make up a release, primary first.
    pub fn all() -> [AssetKind; 2] {
        [AssetKind::Node, AssetKind::Console]
    }

    /// The asset id used in catalog and directory names.
    pub fn name(&self) -> &'static str {
        match self {
            AssetKind::Node => "forge",
            AssetKind::Console => "forge-console",
        }
    }

    /// The executable name the asset ships.
    pub fn binary_name(&self) -> &'static str {
        match self {
            AssetKind::Node => "forge",
            AssetKind::Console => "forge-console",
        }
    }

    /// Short component name used in chain tags.
    ///
    /// The primary component's tag omits this entirely.
    pub fn component_name(&self) -> &'static str {
        match self {
            AssetKind::Node => "node",
            AssetKind::Console => "console",
        }
    }

    /// Human-readable name for reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            AssetKind::Node => "Forge node",
            AssetKind::Console => "Forge web console",
        }
    }

    /// Whether this asset is the one a profile runs.
    pub fn is_primary(&self) -> bool {
        matches!(self, AssetKind::Node)
    }

    /// Archive filename for a platform, as published on mirrors.
    ///
    /// Format: `{asset}_{platform}_amd64.tgz`
    pub fn archive_name(&self, platform: Platform) -> String {
        format!("{}_{}_amd64.tgz", self.name(), platform.tag())
    }

    /// Remote catalog path of the latest-version index for this asset.
    pub fn latest_index_path(&self) -> String {
        format!("{}/latest.json", self.name())
    }

    /// Remote catalog path of a versioned archive.
    pub fn archive_path(&self, version: &Version, platform: Platform) -> String {
        format!("{}/{}/{}", self.name(), version, self.archive_name(platform))
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized platform tags recognized by mirrors.
///
/// Anything outside this set fails fast rather than silently falling back
/// to a default archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Darwin,
}

impl Platform {
    /// Detect the platform of the current host.
    pub fn detect() -> Result<Self, ForgeError> {
        Self::from_tag(std::env::consts::OS)
    }

    /// Parse a normalized platform tag.
    pub fn from_tag(tag: &str) -> Result<Self, ForgeError> {
        match tag {
            "linux" => Ok(Platform::Linux),
            "darwin" | "macos" => Ok(Platform::Darwin),
            other => Err(ForgeError::UnsupportedPlatform(other.to_string())),
        }
    }

    /// The tag used in archive filenames.
    pub fn tag(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A concrete release of one asset.
///
/// A release starts *catalogued* (known to exist at `source_uri`) and becomes
/// *installed* once downloaded and extracted, at which point `local_path`
/// points at the extracted directory. Releases are never mutated, only
/// superseded by a newer version of the same asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Which asset this release belongs to.
    pub asset: AssetKind,
    /// Concrete semantic version.
    pub version: Version,
    /// Where the tarball came from (URL or mirror path).
    pub source_uri: String,
    /// Declared tarball size, if the source reported one. Sizes scale the
    /// progress display only; they never gate correctness.
    pub size_bytes: Option<u64>,
    /// Extraction directory, set once installed.
    pub local_path: Option<PathBuf>,
}

impl Release {
    /// Create a catalogued (not yet installed) release.
    pub fn catalogued(
        asset: AssetKind,
        version: Version,
        source_uri: impl Into<String>,
        size_bytes: Option<u64>,
    ) -> Self {
        Self {
            asset,
            version,
            source_uri: source_uri.into(),
            size_bytes,
            local_path: None,
        }
    }

    /// Mark this release as installed at `path`.
    pub fn installed_at(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    /// Create a record for an already-extracted release.
    ///
    /// Once extracted the original source is no longer known; the local tree
    /// itself is the source of record.
    pub fn installed(asset: AssetKind, version: Version, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            asset,
            version,
            source_uri: path.display().to_string(),
            size_bytes: None,
            local_path: Some(path),
        }
    }

    /// Whether the release has been extracted locally.
    pub fn is_installed(&self) -> bool {
        self.local_path.is_some()
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.asset, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_names() {
        assert_eq!(AssetKind::Node.name(), "forge");
        assert_eq!(AssetKind::Console.name(), "forge-console");
    }

    #[test]
    fn test_primary_asset_is_first() {
        let all = AssetKind::all();
        assert!(all[0].is_primary());
        assert!(!all[1].is_primary());
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(
            AssetKind::Node.archive_name(Platform::Linux),
            "forge_linux_amd64.tgz"
        );
        assert_eq!(
            AssetKind::Console.archive_name(Platform::Darwin),
            "forge-console_darwin_amd64.tgz"
        );
    }

    #[test]
    fn test_archive_path() {
        let path = AssetKind::Node.archive_path(&Version::new(0, 39, 1), Platform::Linux);
        assert_eq!(path, "forge/0.39.1/forge_linux_amd64.tgz");
    }

    #[test]
    fn test_latest_index_path() {
        assert_eq!(AssetKind::Node.latest_index_path(), "forge/latest.json");
        assert_eq!(
            AssetKind::Console.latest_index_path(),
            "forge-console/latest.json"
        );
    }

    #[test]
    fn test_platform_from_tag() {
        assert_eq!(Platform::from_tag("linux").unwrap(), Platform::Linux);
        assert_eq!(Platform::from_tag("darwin").unwrap(), Platform::Darwin);
        assert_eq!(Platform::from_tag("macos").unwrap(), Platform::Darwin);
    }

    #[test]
    fn test_platform_unknown_fails_fast() {
        let err = Platform::from_tag("win32").unwrap_err();
        assert!(matches!(err, ForgeError::UnsupportedPlatform(ref t) if t == "win32"));
    }

    #[test]
    fn test_release_lifecycle() {
        let release = Release::catalogued(
            AssetKind::Node,
            Version::new(1, 0, 0),
            "https://mirror/forge/1.0.0/forge_linux_amd64.tgz",
            Some(1024),
        );
        assert!(!release.is_installed());

        let installed = release.installed_at("/srv/forge/mainnet/release/forge/1.0.0");
        assert!(installed.is_installed());
        assert_eq!(installed.size_bytes, Some(1024));
    }

    #[test]
    fn test_installed_release_points_at_local_tree() {
        let release = Release::installed(
            AssetKind::Console,
            Version::new(0, 39, 1),
            "/srv/forge/mainnet/release/forge-console/0.39.1",
        );
        assert!(release.is_installed());
        assert_eq!(
            release.source_uri,
            "/srv/forge/mainnet/release/forge-console/0.39.1"
        );
    }

    #[test]
    fn test_release_display() {
        let release = Release::catalogued(AssetKind::Node, Version::new(0, 39, 1), "uri", None);
        assert_eq!(release.to_string(), "forge v0.39.1");
    }
}
