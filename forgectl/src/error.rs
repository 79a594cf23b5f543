//! Error types for release management and process supervision.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for forgectl operations.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Errors that can occur while managing releases or supervising processes.
///
/// Download failures are split into two classes: [`ForgeError::DownloadFailed`]
/// is transient and retried up to the configured budget, while
/// [`ForgeError::VersionOrAssetNotFound`] (an explicit 404 or absent mirror
/// path) aborts immediately and is never retried.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The version catalog (directory listing or HTTP index) cannot be read.
    #[error("catalog unavailable at {location}: {reason}")]
    CatalogUnavailable { location: String, reason: String },

    /// The requested version or asset does not exist in the catalog.
    #[error("{asset} version {version} not found in the catalog")]
    VersionOrAssetNotFound { asset: String, version: String },

    /// The requested version token could not be parsed as (partial) semver.
    #[error("invalid version {input:?}: {reason}")]
    InvalidVersion { input: String, reason: String },

    /// The host platform is not in the supported set.
    #[error("unsupported platform {0:?} (supported: linux, darwin)")]
    UnsupportedPlatform(String),

    /// A download failed for a transient reason (connection reset, short read).
    #[error("failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// A network operation exceeded its inactivity timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Failed to read a file or directory.
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {path}: {source}")]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Archive extraction failed.
    #[error("failed to extract {path}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    /// Activation (or removal) of a version that is not on disk.
    #[error("{asset} version {version} is not installed")]
    NotInstalled { asset: String, version: String },

    /// Removal of the version the activation pointer references.
    #[error("{asset} version {version} is the active version; activate another version first")]
    ActiveVersion { asset: String, version: String },

    /// A destructive operation was requested while the component is live.
    #[error("{component} is still running (pid {pid}); stop it first")]
    ProcessStillRunning { component: String, pid: i32 },

    /// The OS process table could not be scanned at all.
    #[error("failed to scan process table: {reason}")]
    ProcessScanFailed { reason: String },

    /// Failed to deliver a signal to a process.
    #[error("failed to signal pid {pid}: {reason}")]
    SignalFailed { pid: i32, reason: String },

    /// No free port remained in the preferred range for a service class.
    #[error(
        "no free {service} port in {start}..{end}; \
         free a port in this range or stop unrelated listeners"
    )]
    PortRangeExhausted {
        service: String,
        start: u16,
        end: u16,
    },

    /// A bounded wait ran out of time before its predicate held.
    #[error("timed out after {timeout_secs}s waiting for {what}")]
    WaitTimedOut { what: String, timeout_secs: u64 },
}
