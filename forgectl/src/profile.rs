//! Chain profiles.
//!
//! A profile is an independently-configured chain instance with its own
//! directory tree, ports, and release pointers:
//!
//! ```text
//! <base>/<profile>/
//!   forge.ini                         profile configuration ([ports] section)
//!   staging/                          tarballs in transit
//!   release/<asset>/release.yml       activation pointer
//!   release/<asset>/<version>/...     extracted release contents
//! ```
//!
//! Profiles never share state; the tag in [`crate::supervisor::tag`] keeps
//! even their identically-named processes apart.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;
use semver::Version;

use crate::config::ForgeConfig;
use crate::error::{ForgeError, ForgeResult};
use crate::release::asset::AssetKind;

/// Name of the per-profile configuration file.
pub const PROFILE_CONFIG_FILE: &str = "forge.ini";

/// Name of the per-asset activation pointer file.
pub const POINTER_FILE: &str = "release.yml";

/// One chain profile rooted at a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    name: String,
    root: PathBuf,
}

impl Profile {
    /// Create a profile handle. Nothing is created on disk.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// The profile named by a configuration.
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self::new(&config.profile_name, config.profile_dir())
    }

    /// Profile name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Profile root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of all releases for this profile.
    pub fn release_root(&self) -> PathBuf {
        self.root.join("release")
    }

    /// Directory of one asset's releases.
    pub fn asset_dir(&self, asset: AssetKind) -> PathBuf {
        self.release_root().join(asset.name())
    }

    /// Directory of one installed version.
    pub fn version_dir(&self, asset: AssetKind, version: &Version) -> PathBuf {
        self.asset_dir(asset).join(version.to_string())
    }

    /// The asset's activation pointer file.
    pub fn pointer_file(&self, asset: AssetKind) -> PathBuf {
        self.asset_dir(asset).join(POINTER_FILE)
    }

    /// Staging directory for tarballs in transit.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    /// The profile configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.root.join(PROFILE_CONFIG_FILE)
    }

    /// Ports bound by this profile, keyed by service class name.
    ///
    /// Read from the `[ports]` section of `forge.ini`. A missing config file
    /// or missing section yields an empty map; the profile simply holds no
    /// ports yet.
    pub fn ports(&self) -> ForgeResult<HashMap<String, u16>> {
        let path = self.config_file();
        if !path.is_file() {
            return Ok(HashMap::new());
        }

        let ini = Ini::load_from_file(&path).map_err(|e| ForgeError::ReadFailed {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
        })?;

        let mut ports = HashMap::new();
        if let Some(section) = ini.section(Some("ports")) {
            for (key, value) in section.iter() {
                if let Ok(port) = value.parse::<u16>() {
                    ports.insert(key.to_string(), port);
                }
            }
        }
        Ok(ports)
    }

    /// All profiles under `base_dir`.
    ///
    /// A directory counts as a profile when it carries a config file or a
    /// release tree. An unreadable base directory yields an empty list;
    /// there are simply no profiles yet.
    pub fn list(base_dir: &Path) -> Vec<Profile> {
        let Ok(entries) = fs::read_dir(base_dir) else {
            return Vec::new();
        };

        let mut profiles: Vec<Profile> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                let profile = Profile::new(name, e.path());
                let looks_like_profile = profile.config_file().is_file()
                    || profile.release_root().is_dir();
                looks_like_profile.then_some(profile)
            })
            .collect();

        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        profiles
    }
}
