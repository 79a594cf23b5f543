//! Release management: catalogs, downloads, storage, and activation.
//!
//! The pipeline an install moves through:
//!
//! 1. [`resolver`] turns a version token into a concrete version
//! 2. [`source`] locates the tarball for each asset of that version
//! 3. [`download`] transfers it into the profile's staging directory
//! 4. [`store`] extracts it and moves the activation pointer
//!
//! [`installer`] drives the whole pipeline; the individual pieces stay
//! public for callers that need only one step.

pub mod asset;
pub mod download;
pub mod installer;
pub mod progress;
pub mod resolver;
pub mod source;
pub mod store;

pub use asset::{AssetKind, Platform, Release};
pub use download::Downloader;
pub use installer::{InstallProgressCallback, InstallReport, InstallStage, ReleaseInstaller};
pub use resolver::{normalize_version, VersionResolver};
pub use source::{AssetDescriptor, AssetSource, LocalSource, RemoteSource, TransportLocator};
pub use store::{ActivationPointer, ReleaseStore};
