//! Filesystem mirror source.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use semver::Version;

use crate::error::{ForgeError, ForgeResult};
use crate::release::asset::{AssetKind, Platform};

use super::{AssetDescriptor, AssetSource, TransportLocator};

/// A local filesystem mirror.
///
/// Layout: `<root>/<version>/<asset>_<platform>_amd64.tgz`. Directory names
/// that do not parse as full semver are ignored, so the mirror root may hold
/// unrelated files.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    /// Create a source backed by the mirror at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The mirror root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All versions present in the mirror, ascending.
    ///
    /// A version counts as present for no particular asset here; callers
    /// that care about one asset should filter with [`AssetSource::has_version`].
    pub fn list_versions(&self) -> ForgeResult<Vec<Version>> {
        let version_dir = Regex::new(r"^\d+\.\d+\.\d+$").expect("static regex");

        let entries = fs::read_dir(&self.root).map_err(|e| ForgeError::CatalogUnavailable {
            location: self.root.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut versions: Vec<Version> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                if version_dir.is_match(&name) {
                    Version::parse(&name).ok()
                } else {
                    None
                }
            })
            .collect();

        versions.sort();
        Ok(versions)
    }

    fn archive_path(&self, asset: AssetKind, version: &Version, platform: Platform) -> PathBuf {
        self.root
            .join(version.to_string())
            .join(asset.archive_name(platform))
    }
}

impl AssetSource for LocalSource {
    fn latest_version(&self, asset: AssetKind) -> ForgeResult<Version> {
        // Presence of any platform's archive counts; mirrors are usually
        // populated per host platform anyway.
        let latest = self
            .list_versions()?
            .into_iter()
            .filter(|v| {
                [Platform::Linux, Platform::Darwin]
                    .iter()
                    .any(|p| self.archive_path(asset, v, *p).is_file())
            })
            .max();

        latest.ok_or_else(|| ForgeError::VersionOrAssetNotFound {
            asset: asset.name().to_string(),
            version: "latest".to_string(),
        })
    }

    fn has_version(
        &self,
        asset: AssetKind,
        version: &Version,
        platform: Platform,
    ) -> ForgeResult<bool> {
        Ok(self.archive_path(asset, version, platform).is_file())
    }

    fn list_asset_names(
        &self,
        version: &Version,
        platform: Platform,
    ) -> ForgeResult<Vec<AssetKind>> {
        let version_dir = self.root.join(version.to_string());
        if !version_dir.is_dir() {
            return Err(ForgeError::VersionOrAssetNotFound {
                asset: "any".to_string(),
                version: version.to_string(),
            });
        }

        Ok(AssetKind::all()
            .into_iter()
            .filter(|asset| self.archive_path(*asset, version, platform).is_file())
            .collect())
    }

    fn describe(
        &self,
        asset: AssetKind,
        version: &Version,
        platform: Platform,
    ) -> ForgeResult<AssetDescriptor> {
        let path = self.archive_path(asset, version, platform);
        if !path.is_file() {
            return Err(ForgeError::VersionOrAssetNotFound {
                asset: asset.name().to_string(),
                version: version.to_string(),
            });
        }

        let size_bytes = fs::metadata(&path).ok().map(|m| m.len());

        Ok(AssetDescriptor {
            asset,
            version: version.clone(),
            display_name: asset.display_name().to_string(),
            locator: TransportLocator::File(path),
            size_bytes,
        })
    }
}
