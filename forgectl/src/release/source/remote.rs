//! HTTP mirror source.

use std::time::Duration;

use reqwest::blocking::Client;
use semver::Version;
use serde::Deserialize;

use crate::error::{ForgeError, ForgeResult};
use crate::release::asset::{AssetKind, Platform};

use super::{AssetDescriptor, AssetSource, TransportLocator};

/// Default timeout for catalog requests.
const CATALOG_TIMEOUT_SECS: u64 = 30;

/// Shape of `<mirror>/<asset>/latest.json`.
#[derive(Debug, Deserialize)]
struct LatestIndex {
    latest: String,
}

/// A remote HTTP release mirror.
///
/// Catalog queries (`latest.json`, existence probes) use a short timeout;
/// tarball transfer itself is the downloader's concern and carries the long
/// per-asset timeout.
#[derive(Debug)]
pub struct RemoteSource {
    base_url: String,
    client: Client,
}

impl RemoteSource {
    /// Create a source for the mirror at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(CATALOG_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self { base_url, client }
    }

    /// The mirror base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of an asset's versioned archive.
    pub fn archive_url(&self, asset: AssetKind, version: &Version, platform: Platform) -> String {
        format!(
            "{}/{}",
            self.base_url,
            asset.archive_path(version, platform)
        )
    }

    fn latest_index_url(&self, asset: AssetKind) -> String {
        format!("{}/{}", self.base_url, asset.latest_index_path())
    }

    /// HEAD an archive URL. `Ok(Some(len))`/`Ok(None)` when present,
    /// `Err` wraps the not-found and unreachable cases.
    fn probe_archive(
        &self,
        asset: AssetKind,
        version: &Version,
        platform: Platform,
    ) -> ForgeResult<Option<u64>> {
        let url = self.archive_url(asset, version, platform);
        let response = self.client.head(&url).send().map_err(|e| {
            ForgeError::CatalogUnavailable {
                location: url.clone(),
                reason: e.to_string(),
            }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ForgeError::VersionOrAssetNotFound {
                asset: asset.name().to_string(),
                version: version.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(ForgeError::CatalogUnavailable {
                location: url,
                reason: format!("HEAD request failed with status {}", response.status()),
            });
        }

        Ok(response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok()))
    }
}

impl AssetSource for RemoteSource {
    fn latest_version(&self, asset: AssetKind) -> ForgeResult<Version> {
        let url = self.latest_index_url(asset);

        let response = self.client.get(&url).send().map_err(|e| {
            ForgeError::CatalogUnavailable {
                location: url.clone(),
                reason: e.to_string(),
            }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ForgeError::VersionOrAssetNotFound {
                asset: asset.name().to_string(),
                version: "latest".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(ForgeError::CatalogUnavailable {
                location: url.clone(),
                reason: format!("GET request failed with status {}", response.status()),
            });
        }

        let raw = response
            .text()
            .map_err(|e| ForgeError::CatalogUnavailable {
                location: url.clone(),
                reason: e.to_string(),
            })?;
        let index: LatestIndex =
            serde_json::from_str(&raw).map_err(|e| ForgeError::CatalogUnavailable {
                location: url.clone(),
                reason: format!("invalid latest.json: {}", e),
            })?;

        Version::parse(&index.latest).map_err(|e| ForgeError::CatalogUnavailable {
            location: url,
            reason: format!("latest.json carries non-semver version: {}", e),
        })
    }

    fn has_version(
        &self,
        asset: AssetKind,
        version: &Version,
        platform: Platform,
    ) -> ForgeResult<bool> {
        match self.probe_archive(asset, version, platform) {
            Ok(_) => Ok(true),
            Err(ForgeError::VersionOrAssetNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn list_asset_names(
        &self,
        version: &Version,
        platform: Platform,
    ) -> ForgeResult<Vec<AssetKind>> {
        let mut present = Vec::new();
        for asset in AssetKind::all() {
            if self.has_version(asset, version, platform)? {
                present.push(asset);
            }
        }
        Ok(present)
    }

    fn describe(
        &self,
        asset: AssetKind,
        version: &Version,
        platform: Platform,
    ) -> ForgeResult<AssetDescriptor> {
        let size_bytes = self.probe_archive(asset, version, platform)?;

        Ok(AssetDescriptor {
            asset,
            version: version.clone(),
            display_name: asset.display_name().to_string(),
            locator: TransportLocator::Http(self.archive_url(asset, version, platform)),
            size_bytes,
        })
    }
}
