//! Advisory download progress reporting.
//!
//! A reporter thread periodically stats the destination file and invokes a
//! callback with `(bytes_on_disk, declared_total)`. The poll is advisory
//! only: nothing in the download or retry path reads it, and a missing
//! `Content-Length` simply makes the total `0` (indeterminate).

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Progress callback.
///
/// # Arguments
///
/// * `bytes` - Bytes currently on disk at the destination
/// * `total` - Declared total size, or 0 when unknown (indeterminate)
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Polls a destination file's size on a background thread.
///
/// Dropping the reporter signals the thread and joins it, emitting one final
/// report so callers always observe the terminal size.
pub struct FileProgressReporter {
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FileProgressReporter {
    /// Start polling `dest` every `interval`.
    ///
    /// `total` is the declared content length, or `None` for indeterminate
    /// progress.
    pub fn start(
        dest: PathBuf,
        total: Option<u64>,
        interval: Duration,
        callback: ProgressCallback,
    ) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let done_flag = Arc::clone(&done);
        let total = total.unwrap_or(0);

        let handle = thread::spawn(move || {
            while !done_flag.load(Ordering::SeqCst) {
                let bytes = fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
                callback(bytes, total);
                thread::sleep(interval);
            }

            // Final report
            let bytes = fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
            callback(bytes, total);
        });

        Self {
            done,
            handle: Some(handle),
        }
    }

    /// Stop polling and wait for the final report.
    pub fn finish(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

impl Drop for FileProgressReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reporter_observes_growing_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("asset.tgz");
        fs::write(&dest, b"12345").unwrap();

        let last_bytes = Arc::new(AtomicU64::new(0));
        let last_bytes_clone = Arc::clone(&last_bytes);

        let reporter = FileProgressReporter::start(
            dest.clone(),
            Some(10),
            Duration::from_millis(5),
            Box::new(move |bytes, total| {
                assert_eq!(total, 10);
                last_bytes_clone.store(bytes, Ordering::SeqCst);
            }),
        );

        fs::write(&dest, b"1234567890").unwrap();
        thread::sleep(Duration::from_millis(30));
        reporter.finish();

        assert_eq!(last_bytes.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_reporter_indeterminate_total_is_zero() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("asset.tgz");
        fs::write(&dest, b"abc").unwrap();

        let saw_zero_total = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&saw_zero_total);

        let reporter = FileProgressReporter::start(
            dest,
            None,
            Duration::from_millis(5),
            Box::new(move |_bytes, total| {
                if total != 0 {
                    flag.store(false, Ordering::SeqCst);
                }
            }),
        );

        thread::sleep(Duration::from_millis(20));
        reporter.finish();

        assert!(saw_zero_total.load(Ordering::SeqCst));
    }

    #[test]
    fn test_reporter_final_report_on_drop() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("asset.tgz");
        fs::write(&dest, b"xy").unwrap();

        let calls = Arc::new(AtomicU64::new(0));
        let calls_clone = Arc::clone(&calls);

        let reporter = FileProgressReporter::start(
            dest,
            Some(2),
            Duration::from_millis(5),
            Box::new(move |_bytes, _total| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        drop(reporter);
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }
}
