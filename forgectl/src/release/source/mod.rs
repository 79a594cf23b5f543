//! Pluggable asset sources.
//!
//! An [`AssetSource`] answers two questions: which versions exist, and where
//! the tarball for `(asset, version, platform)` lives. Two implementations
//! are provided:
//!
//! - [`LocalSource`]: a filesystem mirror laid out as
//!   `<root>/<version>/<asset>_<platform>_amd64.tgz`; file presence is the
//!   sole existence check.
//! - [`RemoteSource`]: an HTTP mirror serving `<asset>/latest.json` indexes
//!   and `<asset>/<version>/<archive>` tarballs.
//!
//! Sources only *locate* assets; transferring bytes is the downloader's job.

mod local;
mod remote;

pub use local::LocalSource;
pub use remote::RemoteSource;

use std::path::PathBuf;

use semver::Version;

use crate::error::ForgeResult;
use crate::release::asset::{AssetKind, Platform, Release};

/// Where a located tarball can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportLocator {
    /// A file on the local filesystem (mirror copy).
    File(PathBuf),
    /// An HTTP(S) URL.
    Http(String),
}

impl TransportLocator {
    /// Printable form for reports and logs.
    pub fn uri(&self) -> String {
        match self {
            TransportLocator::File(path) => path.display().to_string(),
            TransportLocator::Http(url) => url.clone(),
        }
    }
}

/// A located, fetchable asset tarball.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    /// Which asset this is.
    pub asset: AssetKind,
    /// Version the tarball was published under.
    pub version: Version,
    /// Human-readable name for progress and reports.
    pub display_name: String,
    /// Where to fetch the tarball from.
    pub locator: TransportLocator,
    /// Declared size in bytes, if the source knows it. Advisory only.
    pub size_bytes: Option<u64>,
}

impl AssetDescriptor {
    /// The catalogued (not yet installed) release this descriptor locates.
    /// This is what remote-listing surfaces show.
    pub fn to_release(&self) -> Release {
        Release::catalogued(
            self.asset,
            self.version.clone(),
            self.locator.uri(),
            self.size_bytes,
        )
    }
}

/// A catalog of installable releases.
pub trait AssetSource {
    /// Highest published version of `asset`.
    ///
    /// Fails with `CatalogUnavailable` when the backing catalog cannot be
    /// read, and `VersionOrAssetNotFound` when the catalog is readable but
    /// holds nothing for this asset.
    fn latest_version(&self, asset: AssetKind) -> ForgeResult<Version>;

    /// Whether `(asset, version)` is published for `platform`.
    fn has_version(
        &self,
        asset: AssetKind,
        version: &Version,
        platform: Platform,
    ) -> ForgeResult<bool>;

    /// The assets published for `(version, platform)`, primary first.
    fn list_asset_names(
        &self,
        version: &Version,
        platform: Platform,
    ) -> ForgeResult<Vec<AssetKind>>;

    /// Locate the tarball for `(asset, version, platform)`.
    fn describe(
        &self,
        asset: AssetKind,
        version: &Version,
        platform: Platform,
    ) -> ForgeResult<AssetDescriptor>;
}
