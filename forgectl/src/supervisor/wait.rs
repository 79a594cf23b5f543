//! Bounded condition waiting.
//!
//! A single primitive replaces ad-hoc polling loops: evaluate a predicate at
//! a fixed interval until it holds or a timeout elapses, and return a
//! `Result` either way. Callers describe *what* they are waiting for so the
//! timeout error is actionable.

use std::time::{Duration, Instant};

use crate::error::{ForgeError, ForgeResult};

/// Wait until `predicate` returns `true`.
///
/// The predicate is evaluated immediately, then every `interval` until
/// `timeout` has elapsed. Returns `WaitTimedOut` naming `what` if time runs
/// out first.
pub fn wait_until<F>(
    what: &str,
    interval: Duration,
    timeout: Duration,
    mut predicate: F,
) -> ForgeResult<()>
where
    F: FnMut() -> bool,
{
    let start = Instant::now();

    loop {
        if predicate() {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(ForgeError::WaitTimedOut {
                what: what.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
        std::thread::sleep(interval.min(timeout.saturating_sub(start.elapsed())));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_immediate_success_does_not_sleep() {
        let start = Instant::now();
        wait_until(
            "nothing",
            Duration::from_secs(10),
            Duration::from_secs(10),
            || true,
        )
        .unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_eventual_success() {
        let calls = AtomicUsize::new(0);
        wait_until(
            "third call",
            Duration::from_millis(1),
            Duration::from_secs(5),
            || calls.fetch_add(1, Ordering::SeqCst) >= 2,
        )
        .unwrap();
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn test_timeout_names_the_wait() {
        let err = wait_until(
            "process exit",
            Duration::from_millis(1),
            Duration::from_millis(10),
            || false,
        )
        .unwrap_err();

        match err {
            ForgeError::WaitTimedOut { what, .. } => assert_eq!(what, "process exit"),
            other => panic!("expected WaitTimedOut, got {:?}", other),
        }
    }
}
