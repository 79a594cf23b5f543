//! Version token resolution.
//!
//! Turns a user-supplied token (`""`, `"latest"`, `"0.40"`, `"v1.2.3"`)
//! into a concrete semantic version. Partial tokens are zero-padded
//! (`"0.40"` → `0.40.0`); the empty token and `"latest"` ask the catalog for
//! its maximum. Already-installed versions are preferred over a catalog
//! query, so switching between installed versions works offline.

use semver::Version;

use crate::error::{ForgeError, ForgeResult};
use crate::release::asset::{AssetKind, Platform};
use crate::release::source::AssetSource;
use crate::release::store::ReleaseStore;

/// Resolves version tokens against a catalog and the local store.
pub struct VersionResolver<'a> {
    source: &'a dyn AssetSource,
    store: &'a ReleaseStore,
    platform: Platform,
}

impl<'a> VersionResolver<'a> {
    /// Create a resolver over a source and the profile's store.
    pub fn new(source: &'a dyn AssetSource, store: &'a ReleaseStore, platform: Platform) -> Self {
        Self {
            source,
            store,
            platform,
        }
    }

    /// Resolve `requested` for `asset`.
    ///
    /// Normalization alone does not guarantee existence: a concrete token is
    /// checked against the local store first (offline-friendly), then
    /// confirmed by the catalog.
    pub fn resolve(&self, requested: &str, asset: AssetKind) -> ForgeResult<Version> {
        let token = requested.trim();

        if token.is_empty() || token.eq_ignore_ascii_case("latest") {
            let latest = self.source.latest_version(asset)?;
            tracing::debug!(asset = asset.name(), version = %latest, "resolved latest");
            return Ok(latest);
        }

        let version = normalize_version(token)?;

        if self.store.is_installed(asset, &version) {
            tracing::debug!(
                asset = asset.name(),
                version = %version,
                "resolved to installed version without catalog query"
            );
            return Ok(version);
        }

        if self.source.has_version(asset, &version, self.platform)? {
            Ok(version)
        } else {
            Err(ForgeError::VersionOrAssetNotFound {
                asset: asset.name().to_string(),
                version: version.to_string(),
            })
        }
    }
}

/// Normalize a possibly-partial semver token to a full version.
///
/// Accepts an optional leading `v`, and 1-3 numeric segments; missing
/// segments become zero (`"0.40"` → `0.40.0`, `"2"` → `2.0.0`).
pub fn normalize_version(token: &str) -> ForgeResult<Version> {
    let invalid = |reason: &str| ForgeError::InvalidVersion {
        input: token.to_string(),
        reason: reason.to_string(),
    };

    let bare = token.strip_prefix('v').unwrap_or(token);
    if bare.is_empty() {
        return Err(invalid("empty version"));
    }

    let segments: Vec<&str> = bare.split('.').collect();
    if segments.len() > 3 {
        return Err(invalid("more than three version segments"));
    }
    for segment in &segments {
        if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("segments must be numeric"));
        }
    }

    let mut padded = segments;
    while padded.len() < 3 {
        padded.push("0");
    }

    Version::parse(&padded.join(".")).map_err(|e| invalid(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::*;
    use crate::profile::Profile;
    use crate::release::source::LocalSource;

    /// Mirror with versions {0.38.0, 0.39.0, 0.39.1} for the node asset.
    fn seeded_mirror(temp: &TempDir) -> LocalSource {
        for v in ["0.38.0", "0.39.0", "0.39.1"] {
            let dir = temp.path().join("mirror").join(v);
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join(AssetKind::Node.archive_name(Platform::Linux)),
                b"tgz",
            )
            .unwrap();
        }
        LocalSource::new(temp.path().join("mirror"))
    }

    fn empty_store(temp: &TempDir) -> ReleaseStore {
        ReleaseStore::new(Profile::new("testnet", temp.path().join("testnet")))
    }

    #[test]
    fn test_latest_resolves_to_catalog_maximum() {
        let temp = TempDir::new().unwrap();
        let source = seeded_mirror(&temp);
        let store = empty_store(&temp);
        let resolver = VersionResolver::new(&source, &store, Platform::Linux);

        assert_eq!(
            resolver.resolve("latest", AssetKind::Node).unwrap(),
            Version::new(0, 39, 1)
        );
        assert_eq!(
            resolver.resolve("", AssetKind::Node).unwrap(),
            Version::new(0, 39, 1)
        );
        assert_eq!(
            resolver.resolve("  LATEST ", AssetKind::Node).unwrap(),
            Version::new(0, 39, 1)
        );
    }

    #[test]
    fn test_partial_token_zero_pads() {
        let temp = TempDir::new().unwrap();
        let source = seeded_mirror(&temp);
        let store = empty_store(&temp);
        let resolver = VersionResolver::new(&source, &store, Platform::Linux);

        assert_eq!(
            resolver.resolve("0.39", AssetKind::Node).unwrap(),
            Version::new(0, 39, 0)
        );
    }

    #[test]
    fn test_unknown_version_is_not_found() {
        let temp = TempDir::new().unwrap();
        let source = seeded_mirror(&temp);
        let store = empty_store(&temp);
        let resolver = VersionResolver::new(&source, &store, Platform::Linux);

        let err = resolver.resolve("0.40.0", AssetKind::Node).unwrap_err();
        assert!(matches!(err, ForgeError::VersionOrAssetNotFound { .. }));
    }

    #[test]
    fn test_installed_version_resolves_without_catalog() {
        let temp = TempDir::new().unwrap();
        let store = empty_store(&temp);
        fs::create_dir_all(
            store
                .profile()
                .version_dir(AssetKind::Node, &Version::new(0, 37, 0)),
        )
        .unwrap();

        // The mirror does not carry 0.37.0; the installed copy wins.
        let source = seeded_mirror(&temp);
        let resolver = VersionResolver::new(&source, &store, Platform::Linux);

        assert_eq!(
            resolver.resolve("0.37", AssetKind::Node).unwrap(),
            Version::new(0, 37, 0)
        );
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("0.40").unwrap(), Version::new(0, 40, 0));
        assert_eq!(normalize_version("2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(
            normalize_version("v1.2.3").unwrap(),
            Version::new(1, 2, 3)
        );
    }

    #[test]
    fn test_normalize_version_rejects_garbage() {
        for bad in ["", "v", "1.2.3.4", "1..2", "abc", "1.x"] {
            assert!(
                matches!(
                    normalize_version(bad),
                    Err(ForgeError::InvalidVersion { .. })
                ),
                "{:?} should be rejected",
                bad
            );
        }
    }

    proptest! {
        /// Any full numeric triple normalizes to itself.
        #[test]
        fn prop_full_triple_is_identity(major in 0u64..100, minor in 0u64..100, patch in 0u64..100) {
            let token = format!("{}.{}.{}", major, minor, patch);
            prop_assert_eq!(
                normalize_version(&token).unwrap(),
                Version::new(major, minor, patch)
            );
        }

        /// Partial tokens always pad with zeros, never with anything else.
        #[test]
        fn prop_partial_pads_zero(major in 0u64..100, minor in 0u64..100) {
            let token = format!("{}.{}", major, minor);
            prop_assert_eq!(
                normalize_version(&token).unwrap(),
                Version::new(major, minor, 0)
            );
        }
    }
}
