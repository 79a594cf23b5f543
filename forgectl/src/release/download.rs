//! Asset tarball transfer.
//!
//! One [`Downloader`] moves a located tarball to a destination path:
//! file locators are copied, HTTP locators are streamed with a hard
//! inactivity timeout. Transient failures are retried up to the configured
//! budget for the same descriptor; an HTTP 404 aborts immediately as
//! [`ForgeError::VersionOrAssetNotFound`] and is never retried.
//!
//! Re-invocation truncates and overwrites the destination. There is no
//! resume: a partial file from an interrupted run is simply replaced.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{ForgeError, ForgeResult};
use crate::release::progress::{FileProgressReporter, ProgressCallback};
use crate::release::source::{AssetDescriptor, TransportLocator};

/// Buffer size for streamed writes (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Transfers located tarballs to local paths.
#[derive(Debug)]
pub struct Downloader {
    client: Client,
    timeout: Duration,
    retry_budget: u32,
    progress_interval: Duration,
}

impl Downloader {
    /// Create a downloader with the given per-asset timeout and retry budget.
    pub fn new(timeout: Duration, retry_budget: u32, progress_interval: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            timeout,
            retry_budget: retry_budget.max(1),
            progress_interval,
        }
    }

    /// The configured retry budget.
    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    /// Fetch `descriptor` to `dest`, returning the byte count written.
    pub fn fetch(&self, descriptor: &AssetDescriptor, dest: &Path) -> ForgeResult<u64> {
        self.fetch_inner(descriptor, dest, None)
    }

    /// Fetch with an advisory progress callback.
    ///
    /// Progress is driven by a background poll of the destination file size;
    /// a missing declared size reports an indeterminate total of 0.
    pub fn fetch_with_progress(
        &self,
        descriptor: &AssetDescriptor,
        dest: &Path,
        on_progress: ProgressCallback,
    ) -> ForgeResult<u64> {
        self.fetch_inner(descriptor, dest, Some(on_progress))
    }

    fn fetch_inner(
        &self,
        descriptor: &AssetDescriptor,
        dest: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> ForgeResult<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| ForgeError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let reporter = on_progress.map(|cb| {
            FileProgressReporter::start(
                dest.to_path_buf(),
                descriptor.size_bytes,
                self.progress_interval,
                cb,
            )
        });

        let result = match &descriptor.locator {
            TransportLocator::File(path) => self.copy_local(path, dest),
            TransportLocator::Http(url) => self.fetch_http(descriptor, url, dest),
        };

        if let Some(reporter) = reporter {
            reporter.finish();
        }

        result
    }

    /// Copy a mirror file into place.
    fn copy_local(&self, source: &Path, dest: &Path) -> ForgeResult<u64> {
        fs::copy(source, dest).map_err(|e| ForgeError::ReadFailed {
            path: source.to_path_buf(),
            source: e,
        })
    }

    /// Stream an HTTP locator, retrying transient failures to budget.
    fn fetch_http(
        &self,
        descriptor: &AssetDescriptor,
        url: &str,
        dest: &Path,
    ) -> ForgeResult<u64> {
        let mut last_err = None;

        for attempt in 1..=self.retry_budget {
            match self.stream_once(descriptor, url, dest) {
                Ok(bytes) => {
                    if attempt > 1 {
                        tracing::info!(url, attempt, "download succeeded after retry");
                    }
                    return Ok(bytes);
                }
                // A 404 means the catalog and mirror disagree; retrying
                // cannot help.
                Err(e @ ForgeError::VersionOrAssetNotFound { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        url,
                        attempt,
                        budget = self.retry_budget,
                        error = %e,
                        "transient download failure"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ForgeError::DownloadFailed {
            url: url.to_string(),
            reason: "retry budget exhausted".to_string(),
        }))
    }

    /// One streamed GET attempt, overwriting `dest`.
    fn stream_once(
        &self,
        descriptor: &AssetDescriptor,
        url: &str,
        dest: &Path,
    ) -> ForgeResult<u64> {
        let mut response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                ForgeError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                ForgeError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ForgeError::VersionOrAssetNotFound {
                asset: descriptor.asset.name().to_string(),
                version: descriptor.version.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ForgeError::DownloadFailed {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }

        let file = File::create(dest).map_err(|e| ForgeError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            let bytes_read = response.read(&mut buffer).map_err(|e| {
                if read_error_is_timeout(&e) {
                    ForgeError::Timeout {
                        url: url.to_string(),
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    ForgeError::DownloadFailed {
                        url: url.to_string(),
                        reason: format!("read error: {}", e),
                    }
                }
            })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| ForgeError::WriteFailed {
                    path: dest.to_path_buf(),
                    source: e,
                })?;
            written += bytes_read as u64;
        }

        writer.flush().map_err(|e| ForgeError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        Ok(written)
    }
}

/// The body reader surfaces reqwest's inactivity timeout as an `io::Error`;
/// recognize it both by kind and by the wrapped source.
fn read_error_is_timeout(e: &std::io::Error) -> bool {
    if e.kind() == std::io::ErrorKind::TimedOut {
        return true;
    }
    e.get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .map(|inner| inner.is_timeout())
        .unwrap_or(false)
}
