//! Guarded operations.
//!
//! Anything destructive or state-changing runs as a [`GuardedOp`]: a
//! preflight [`GuardedOp::verify`] that holds every guard (no live process,
//! not the active version), then an [`GuardedOp::execute`] that does the
//! work. [`GuardedOp::run`] chains the two; callers that want a dry-run call
//! `verify` alone.

use std::time::Duration;

use semver::Version;

use crate::error::{ForgeError, ForgeResult};
use crate::profile::Profile;
use crate::release::asset::AssetKind;
use crate::release::store::{ActivationPointer, ReleaseStore};
use crate::supervisor::registry::ProcessRegistry;
use crate::supervisor::tag::chain_tag;
use crate::supervisor::wait::wait_until;

/// How long a stop waits for the process to leave the table after SIGTERM.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval while waiting for a signalled process to exit.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// An operation with a separable preflight check.
pub trait GuardedOp {
    /// What a successful execution yields.
    type Output;

    /// Hold every guard without changing anything.
    fn verify(&self) -> ForgeResult<()>;

    /// Do the work. Assumes `verify` passed.
    fn execute(&self) -> ForgeResult<Self::Output>;

    /// Verify, then execute.
    fn run(&self) -> ForgeResult<Self::Output> {
        self.verify()?;
        self.execute()
    }
}

/// Point a profile's asset at an installed version.
///
/// Guard: the component must not be running, so a live process never has its
/// binary swapped out from under it.
pub struct ActivateRelease<'a> {
    store: &'a ReleaseStore,
    registry: &'a ProcessRegistry,
    asset: AssetKind,
    version: Version,
}

impl<'a> ActivateRelease<'a> {
    pub fn new(
        store: &'a ReleaseStore,
        registry: &'a ProcessRegistry,
        asset: AssetKind,
        version: Version,
    ) -> Self {
        Self {
            store,
            registry,
            asset,
            version,
        }
    }
}

impl GuardedOp for ActivateRelease<'_> {
    type Output = ActivationPointer;

    fn verify(&self) -> ForgeResult<()> {
        self.registry
            .ensure_not_running(self.store.profile(), self.asset)
    }

    fn execute(&self) -> ForgeResult<ActivationPointer> {
        self.store.activate(self.asset, &self.version)
    }
}

/// Delete an installed version.
///
/// Guards: the component must not be running, and the version must not be
/// the one the activation pointer references.
pub struct RemoveRelease<'a> {
    store: &'a ReleaseStore,
    registry: &'a ProcessRegistry,
    asset: AssetKind,
    version: Version,
}

impl<'a> RemoveRelease<'a> {
    pub fn new(
        store: &'a ReleaseStore,
        registry: &'a ProcessRegistry,
        asset: AssetKind,
        version: Version,
    ) -> Self {
        Self {
            store,
            registry,
            asset,
            version,
        }
    }
}

impl GuardedOp for RemoveRelease<'_> {
    type Output = ();

    fn verify(&self) -> ForgeResult<()> {
        self.registry
            .ensure_not_running(self.store.profile(), self.asset)?;

        if self.store.active(self.asset)? == Some(self.version.clone()) {
            return Err(ForgeError::ActiveVersion {
                asset: self.asset.name().to_string(),
                version: self.version.to_string(),
            });
        }
        Ok(())
    }

    fn execute(&self) -> ForgeResult<()> {
        self.store.remove(self.asset, &self.version)
    }
}

/// Stop a profile's component.
///
/// Sends SIGTERM (or SIGKILL with `force`) and waits for the process to
/// leave the table. Yields `false` when nothing was running; escalation
/// from SIGTERM to SIGKILL is never automatic.
pub struct StopComponent<'a> {
    registry: &'a ProcessRegistry,
    profile: &'a Profile,
    asset: AssetKind,
    force: bool,
    timeout: Duration,
}

impl<'a> StopComponent<'a> {
    pub fn new(registry: &'a ProcessRegistry, profile: &'a Profile, asset: AssetKind) -> Self {
        Self {
            registry,
            profile,
            asset,
            force: false,
            timeout: STOP_TIMEOUT,
        }
    }

    /// Use SIGKILL instead of SIGTERM.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Override the exit-wait timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl GuardedOp for StopComponent<'_> {
    /// `true` when a process was stopped, `false` when none was running.
    type Output = bool;

    fn verify(&self) -> ForgeResult<()> {
        Ok(())
    }

    fn execute(&self) -> ForgeResult<bool> {
        let tag = chain_tag(self.profile.name(), self.asset);
        let name = self.asset.binary_name();

        let Some(record) = self.registry.find_component(name, &tag)? else {
            tracing::debug!(component = name, "nothing to stop");
            return Ok(false);
        };

        self.registry.signal(record.pid, self.force)?;

        wait_until(
            &format!("{} (pid {}) to exit", name, record.pid),
            STOP_POLL_INTERVAL,
            self.timeout,
            || {
                self.registry
                    .find_component(name, &tag)
                    .map(|found| found.is_none())
                    .unwrap_or(false)
            },
        )?;

        tracing::info!(component = name, pid = record.pid, "stopped component");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn store(temp: &TempDir, name: &str) -> ReleaseStore {
        ReleaseStore::new(Profile::new(name, temp.path().join(name)))
    }

    fn install(store: &ReleaseStore, asset: AssetKind, version: &Version) {
        fs::create_dir_all(store.profile().version_dir(asset, version)).unwrap();
    }

    #[test]
    fn test_activate_release_idle_profile() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, "ops-activate");
        let registry = ProcessRegistry::new();
        let v = Version::new(1, 0, 0);
        install(&store, AssetKind::Node, &v);

        let pointer = ActivateRelease::new(&store, &registry, AssetKind::Node, v.clone())
            .run()
            .unwrap();
        assert_eq!(pointer.current, v);
    }

    #[test]
    fn test_remove_release_refuses_active_version() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, "ops-remove-active");
        let registry = ProcessRegistry::new();
        let v = Version::new(1, 0, 0);
        install(&store, AssetKind::Node, &v);
        store.activate(AssetKind::Node, &v).unwrap();

        let err = RemoveRelease::new(&store, &registry, AssetKind::Node, v.clone())
            .run()
            .unwrap_err();
        assert!(matches!(err, ForgeError::ActiveVersion { .. }));

        // The guard fired before execute: nothing was deleted.
        assert!(store.is_installed(AssetKind::Node, &v));
    }

    #[test]
    fn test_remove_release_inactive_version() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, "ops-remove-inactive");
        let registry = ProcessRegistry::new();
        let v100 = Version::new(1, 0, 0);
        let v110 = Version::new(1, 1, 0);
        install(&store, AssetKind::Node, &v100);
        install(&store, AssetKind::Node, &v110);
        store.activate(AssetKind::Node, &v110).unwrap();

        RemoveRelease::new(&store, &registry, AssetKind::Node, v100.clone())
            .run()
            .unwrap();
        assert!(!store.is_installed(AssetKind::Node, &v100));
        assert!(store.is_installed(AssetKind::Node, &v110));
    }

    #[test]
    fn test_stop_component_nothing_running() {
        let temp = TempDir::new().unwrap();
        let profile = Profile::new("ops-stop-idle", temp.path().join("ops-stop-idle"));
        let registry = ProcessRegistry::new();

        let stopped = StopComponent::new(&registry, &profile, AssetKind::Node)
            .run()
            .unwrap();
        assert!(!stopped);
    }

    #[test]
    fn test_stop_component_terminates_tagged_process() {
        use std::process::Command;

        let temp = TempDir::new().unwrap();
        let profile = Profile::new("ops-stop-live", temp.path().join("ops-stop-live"));
        let registry = ProcessRegistry::new();

        // A binary actually named `forge`, tagged through its environment.
        let forge = temp.path().join("forge");
        fs::copy("/bin/sleep", &forge).unwrap();
        let tag = chain_tag(profile.name(), AssetKind::Node);
        let mut child = Command::new(&forge)
            .arg("30")
            .env("FORGE_CHAIN_TAG", &tag)
            .spawn()
            .unwrap();

        assert!(registry.is_running(&profile, AssetKind::Node).unwrap());

        let stopped = StopComponent::new(&registry, &profile, AssetKind::Node)
            .with_timeout(Duration::from_secs(10))
            .run()
            .unwrap();
        assert!(stopped);

        // Reap so the pid leaves the table for later scans too.
        child.wait().ok();
        assert!(!registry.is_running(&profile, AssetKind::Node).unwrap());
    }
}
