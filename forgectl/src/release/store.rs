//! Versioned release storage and activation.
//!
//! Releases live under `release/<asset>/<version>/`; the per-asset
//! activation pointer lives next to them in `release.yml`:
//!
//! ```yaml
//! current: 1.1.0
//! old: 1.0.0
//! ```
//!
//! Extraction wipes any pre-existing version directory first, so files from
//! a prior failed attempt never survive. Activation only moves the pointer;
//! it is the caller's job (see [`crate::ops`]) to hold the running-process
//! guard. Removal is a separate explicit operation, never implicit.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, ForgeResult};
use crate::profile::Profile;
use crate::release::asset::{AssetKind, Release};

/// Which version a profile will run next, and the one it ran before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPointer {
    /// The active version. Always references an installed release once set.
    pub current: Version,
    /// The previously active version. Retained for display, never
    /// auto-restored.
    pub old: Option<Version>,
}

/// On-disk shape of `release.yml`.
#[derive(Debug, Serialize, Deserialize)]
struct PointerFile {
    current: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    old: Option<String>,
}

/// Store of extracted releases for one profile.
#[derive(Debug, Clone)]
pub struct ReleaseStore {
    profile: Profile,
}

impl ReleaseStore {
    /// Create a store over a profile's release tree.
    pub fn new(profile: Profile) -> Self {
        Self { profile }
    }

    /// The profile this store belongs to.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Whether `(asset, version)` has an extracted directory.
    pub fn is_installed(&self, asset: AssetKind, version: &Version) -> bool {
        self.profile.version_dir(asset, version).is_dir()
    }

    /// Installed versions of an asset, ascending. Missing asset directory
    /// means nothing installed.
    pub fn installed_versions(&self, asset: AssetKind) -> ForgeResult<Vec<Version>> {
        let dir = self.profile.asset_dir(asset);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| ForgeError::ReadFailed {
            path: dir.clone(),
            source: e,
        })?;

        let mut versions: Vec<Version> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| Version::parse(&e.file_name().to_string_lossy()).ok())
            .collect();

        versions.sort();
        Ok(versions)
    }

    /// Installed releases of an asset as [`Release`] records, ascending.
    /// This is what local-listing surfaces show.
    pub fn installed_releases(&self, asset: AssetKind) -> ForgeResult<Vec<Release>> {
        Ok(self
            .installed_versions(asset)?
            .into_iter()
            .map(|version| {
                let dir = self.profile.version_dir(asset, &version);
                Release::installed(asset, version, dir)
            })
            .collect())
    }

    /// Extract a tarball into the version directory, wiping any prior
    /// contents first. Returns the number of extracted files.
    pub fn extract(
        &self,
        tarball: &Path,
        asset: AssetKind,
        version: &Version,
    ) -> ForgeResult<usize> {
        check_required_tools()?;

        let dest = self.profile.version_dir(asset, version);

        // Wipe-first: a partial tree from an interrupted extraction must not
        // mix with this one.
        if dest.exists() {
            fs::remove_dir_all(&dest).map_err(|e| ForgeError::WriteFailed {
                path: dest.clone(),
                source: e,
            })?;
        }
        fs::create_dir_all(&dest).map_err(|e| ForgeError::CreateDirFailed {
            path: dest.clone(),
            source: e,
        })?;

        let output = Command::new("tar")
            .args([
                "-xzf",
                tarball.to_str().unwrap_or(""),
                "-C",
                dest.to_str().unwrap_or(""),
            ])
            .output()
            .map_err(|e| ForgeError::ExtractionFailed {
                path: tarball.to_path_buf(),
                reason: format!("failed to run tar: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ForgeError::ExtractionFailed {
                path: tarball.to_path_buf(),
                reason: format!("tar extraction failed: {}", stderr.trim()),
            });
        }

        let count = count_files_recursive(&dest)?;
        tracing::info!(
            asset = asset.name(),
            version = %version,
            files = count,
            "extracted release"
        );
        Ok(count)
    }

    /// Load the activation pointer. Absence means nothing installed for the
    /// asset.
    pub fn pointer(&self, asset: AssetKind) -> ForgeResult<Option<ActivationPointer>> {
        let path = self.profile.pointer_file(asset);
        if !path.is_file() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path).map_err(|e| ForgeError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;
        let file: PointerFile =
            serde_yaml::from_str(&raw).map_err(|e| ForgeError::ReadFailed {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
            })?;

        let current = parse_pointer_version(&path, &file.current)?;
        let old = file
            .old
            .as_deref()
            .map(|v| parse_pointer_version(&path, v))
            .transpose()?;

        Ok(Some(ActivationPointer { current, old }))
    }

    /// The active version of an asset, if any.
    pub fn active(&self, asset: AssetKind) -> ForgeResult<Option<Version>> {
        Ok(self.pointer(asset)?.map(|p| p.current))
    }

    /// Point the asset at `version`, moving the prior `current` to `old`.
    ///
    /// Re-activating the already-current version is a no-op and leaves the
    /// pointer file untouched. Fails with `NotInstalled` when the version
    /// directory is absent.
    pub fn activate(
        &self,
        asset: AssetKind,
        version: &Version,
    ) -> ForgeResult<ActivationPointer> {
        if !self.is_installed(asset, version) {
            return Err(ForgeError::NotInstalled {
                asset: asset.name().to_string(),
                version: version.to_string(),
            });
        }

        let prior = self.pointer(asset)?;
        if let Some(ref pointer) = prior {
            if pointer.current == *version {
                return Ok(pointer.clone());
            }
        }

        let pointer = ActivationPointer {
            current: version.clone(),
            old: prior.map(|p| p.current),
        };
        self.write_pointer(asset, &pointer)?;

        tracing::info!(
            asset = asset.name(),
            current = %pointer.current,
            old = ?pointer.old,
            "activated release"
        );
        Ok(pointer)
    }

    /// Delete an installed version's directory.
    ///
    /// This does not touch the activation pointer; callers use
    /// [`crate::ops::RemoveRelease`] to hold the active-version and
    /// running-process guards.
    pub fn remove(&self, asset: AssetKind, version: &Version) -> ForgeResult<()> {
        let dir = self.profile.version_dir(asset, version);
        if !dir.is_dir() {
            return Err(ForgeError::NotInstalled {
                asset: asset.name().to_string(),
                version: version.to_string(),
            });
        }

        fs::remove_dir_all(&dir).map_err(|e| ForgeError::WriteFailed {
            path: dir,
            source: e,
        })?;
        tracing::info!(asset = asset.name(), version = %version, "removed release");
        Ok(())
    }

    fn write_pointer(&self, asset: AssetKind, pointer: &ActivationPointer) -> ForgeResult<()> {
        let path = self.profile.pointer_file(asset);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ForgeError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let file = PointerFile {
            current: pointer.current.to_string(),
            old: pointer.old.as_ref().map(|v| v.to_string()),
        };
        let raw = serde_yaml::to_string(&file).map_err(|e| ForgeError::WriteFailed {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
        })?;

        fs::write(&path, raw).map_err(|e| ForgeError::WriteFailed { path, source: e })
    }
}

fn parse_pointer_version(path: &Path, raw: &str) -> ForgeResult<Version> {
    Version::parse(raw).map_err(|e| ForgeError::ReadFailed {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("pointer holds non-semver version {:?}: {}", raw, e),
        ),
    })
}

/// Count files recursively in a directory.
fn count_files_recursive(dir: &Path) -> ForgeResult<usize> {
    let mut count = 0;

    let entries = fs::read_dir(dir).map_err(|e| ForgeError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            count += 1;
        } else if path.is_dir() {
            count += count_files_recursive(&path)?;
        }
    }

    Ok(count)
}

/// Check that the system tar needed for extraction is available.
pub fn check_required_tools() -> ForgeResult<()> {
    if Command::new("tar").arg("--version").output().is_err() {
        return Err(ForgeError::ExtractionFailed {
            path: PathBuf::new(),
            reason: "tar command not found; install tar".to_string(),
        });
    }
    Ok(())
}
