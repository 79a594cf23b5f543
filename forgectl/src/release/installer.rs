//! End-to-end release installation.
//!
//! The installer drives one version of a release through resolve, download,
//! extract, and activate for every asset the catalog publishes. Assets fail
//! *independently*: a broken console tarball is recorded in the report while
//! the node still installs and activates. Only a failure of the primary
//! asset, or a refused activation guard, fails the whole run.

use std::fs;
use std::sync::Arc;

use semver::Version;

use crate::config::ForgeConfig;
use crate::error::{ForgeError, ForgeResult};
use crate::ops::{ActivateRelease, GuardedOp};
use crate::release::asset::AssetKind;
use crate::release::download::Downloader;
use crate::release::resolver::VersionResolver;
use crate::release::source::AssetSource;
use crate::release::store::{ActivationPointer, ReleaseStore};
use crate::supervisor::registry::ProcessRegistry;

/// Phases an installation moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Resolving,
    Downloading,
    Extracting,
    Activating,
    Complete,
}

impl InstallStage {
    /// Stage name for display.
    pub fn name(&self) -> &'static str {
        match self {
            InstallStage::Resolving => "resolving",
            InstallStage::Downloading => "downloading",
            InstallStage::Extracting => "extracting",
            InstallStage::Activating => "activating",
            InstallStage::Complete => "complete",
        }
    }
}

/// Advisory progress callback: stage, fraction in `[0, 1]` (0 when
/// indeterminate), and a short detail line.
pub type InstallProgressCallback = Box<dyn Fn(InstallStage, f64, &str) + Send + Sync>;

/// What one installer run did.
#[derive(Debug)]
pub struct InstallReport {
    /// The concrete version the run operated on.
    pub version: Version,
    /// Assets downloaded and extracted by this run.
    pub installed: Vec<AssetKind>,
    /// Assets already on disk, left untouched.
    pub skipped: Vec<AssetKind>,
    /// Assets that failed, with the error each hit.
    pub failed: Vec<(AssetKind, ForgeError)>,
    /// The pointer written (or confirmed) when activation ran.
    pub activated: Option<ActivationPointer>,
}

impl InstallReport {
    /// Whether every published asset ended up installed or skipped.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Installs releases for one profile from one source.
pub struct ReleaseInstaller<'a> {
    config: &'a ForgeConfig,
    source: &'a dyn AssetSource,
    store: &'a ReleaseStore,
    registry: &'a ProcessRegistry,
}

impl<'a> ReleaseInstaller<'a> {
    pub fn new(
        config: &'a ForgeConfig,
        source: &'a dyn AssetSource,
        store: &'a ReleaseStore,
        registry: &'a ProcessRegistry,
    ) -> Self {
        Self {
            config,
            source,
            store,
            registry,
        }
    }

    /// Install `requested` and activate its primary asset.
    ///
    /// Fails with `ProcessStillRunning` when the primary component is live,
    /// and with the primary asset's own error when it failed to install;
    /// secondary-asset failures only mark the report.
    pub fn install(&self, requested: &str) -> ForgeResult<InstallReport> {
        self.run(requested, true, None)
    }

    /// Install with an advisory progress callback.
    pub fn install_with_progress(
        &self,
        requested: &str,
        on_progress: InstallProgressCallback,
    ) -> ForgeResult<InstallReport> {
        self.run(requested, true, Some(Arc::new(on_progress)))
    }

    /// Download and extract without touching the activation pointer.
    pub fn download(&self, requested: &str) -> ForgeResult<InstallReport> {
        self.run(requested, false, None)
    }

    fn run(
        &self,
        requested: &str,
        activate: bool,
        on_progress: Option<Arc<InstallProgressCallback>>,
    ) -> ForgeResult<InstallReport> {
        let platform = self.config.platform;
        let report_stage = |stage: InstallStage, fraction: f64, detail: &str| {
            if let Some(cb) = &on_progress {
                cb(stage, fraction, detail);
            }
        };

        report_stage(InstallStage::Resolving, 0.0, requested);
        let resolver = VersionResolver::new(self.source, self.store, platform);
        let version = resolver.resolve(requested, AssetKind::Node)?;
        tracing::info!(
            profile = self.store.profile().name(),
            version = %version,
            "installing release"
        );

        let assets = self.source.list_asset_names(&version, platform)?;
        let downloader = Downloader::new(
            self.config.download_timeout,
            self.config.retry_budget,
            self.config.progress_interval,
        );

        let mut report = InstallReport {
            version: version.clone(),
            installed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            activated: None,
        };

        for asset in assets {
            if self.store.is_installed(asset, &version) {
                tracing::debug!(asset = asset.name(), version = %version, "already installed");
                report.skipped.push(asset);
                continue;
            }

            match self.install_one(asset, &version, &downloader, &on_progress) {
                Ok(()) => report.installed.push(asset),
                Err(e) => {
                    tracing::warn!(asset = asset.name(), error = %e, "asset install failed");
                    report.failed.push((asset, e));
                }
            }
        }

        if activate {
            // Activation is pointless when the primary asset itself failed;
            // surface that failure as the run's error.
            if let Some(pos) = report.failed.iter().position(|(a, _)| a.is_primary()) {
                let (_, err) = report.failed.remove(pos);
                return Err(err);
            }

            report_stage(InstallStage::Activating, 0.0, AssetKind::Node.name());
            let pointer =
                ActivateRelease::new(self.store, self.registry, AssetKind::Node, version.clone())
                    .run()?;
            report.activated = Some(pointer);
        }

        report_stage(InstallStage::Complete, 1.0, &version.to_string());
        Ok(report)
    }

    /// Fetch and extract a single asset through the staging directory.
    fn install_one(
        &self,
        asset: AssetKind,
        version: &Version,
        downloader: &Downloader,
        on_progress: &Option<Arc<InstallProgressCallback>>,
    ) -> ForgeResult<()> {
        let platform = self.config.platform;
        let descriptor = self.source.describe(asset, version, platform)?;
        let staged = self
            .store
            .profile()
            .staging_dir()
            .join(asset.archive_name(platform));

        match on_progress {
            Some(cb) => {
                let cb = Arc::clone(cb);
                let detail = descriptor.display_name.clone();
                downloader.fetch_with_progress(
                    &descriptor,
                    &staged,
                    Box::new(move |bytes, total| {
                        let fraction = if total > 0 {
                            (bytes as f64 / total as f64).min(1.0)
                        } else {
                            0.0
                        };
                        cb(InstallStage::Downloading, fraction, &detail);
                    }),
                )?;
            }
            None => {
                downloader.fetch(&descriptor, &staged)?;
            }
        }

        if let Some(cb) = on_progress {
            cb(InstallStage::Extracting, 0.0, asset.name());
        }
        let result = self.store.extract(&staged, asset, version);

        // The staged tarball is transit-only either way.
        fs::remove_file(&staged).ok();

        result.map(|_| ())
    }
}
