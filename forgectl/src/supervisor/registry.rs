//! OS process discovery and control.
//!
//! The registry recomputes its view from the OS process table on every
//! query; nothing is cached or persisted. A process belongs to a component
//! of a profile when its executable name matches and its command line or
//! environment carries the profile's chain tag (see
//! [`crate::supervisor::tag`]), so identically-named processes from other
//! profiles or unrelated software never match.

use std::path::Path;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use procfs::process::{all_processes, Process};

use crate::error::{ForgeError, ForgeResult};
use crate::profile::Profile;
use crate::release::asset::AssetKind;
use crate::supervisor::tag::chain_tag;

/// Best-effort resource sample for one pid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUsage {
    /// Resident set size in bytes.
    pub rss_bytes: u64,
    /// Virtual memory size in bytes.
    pub vsize_bytes: u64,
    /// Thread count.
    pub threads: i64,
    /// Accumulated user+system CPU time in seconds.
    pub cpu_time_secs: u64,
}

/// One discovered component process. Ephemeral: valid only at scan time.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    /// Executable name the process was matched by.
    pub component: String,
    /// OS process id.
    pub pid: i32,
    /// Chain tag the process carries.
    pub chain_tag: String,
    /// Resource sample, when the pid was readable.
    pub usage: Option<ResourceUsage>,
}

/// Scans and controls component processes.
#[derive(Debug, Default)]
pub struct ProcessRegistry;

impl ProcessRegistry {
    /// Create a registry.
    pub fn new() -> Self {
        Self
    }

    /// Find the process running `name` for the profile identified by `tag`.
    ///
    /// Unreadable table entries (vanished pids, foreign-uid procs) are
    /// skipped rather than failing the scan; only an unreadable process
    /// table itself is an error.
    pub fn find_component(&self, name: &str, tag: &str) -> ForgeResult<Option<ProcessRecord>> {
        let processes = all_processes().map_err(|e| ForgeError::ProcessScanFailed {
            reason: e.to_string(),
        })?;

        for proc in processes.flatten() {
            let Ok(stat) = proc.stat() else { continue };
            // A zombie is not a running component.
            if stat.state == 'Z' {
                continue;
            }

            let cmdline = proc.cmdline().unwrap_or_default();
            if !name_matches(&stat.comm, &cmdline, name) {
                continue;
            }
            if !tag_matches(&proc, &cmdline, tag) {
                continue;
            }

            let usage = sample_usage(&proc);
            return Ok(Some(ProcessRecord {
                component: name.to_string(),
                pid: stat.pid,
                chain_tag: tag.to_string(),
                usage,
            }));
        }

        Ok(None)
    }

    /// Whether the component is currently running for the profile.
    pub fn is_running(&self, profile: &Profile, asset: AssetKind) -> ForgeResult<bool> {
        let tag = chain_tag(profile.name(), asset);
        Ok(self.find_component(asset.binary_name(), &tag)?.is_some())
    }

    /// All component processes across the given profiles.
    ///
    /// A failed resource sample for one pid leaves that record's `usage`
    /// empty; it never aborts the batch.
    pub fn list_all(&self, profiles: &[Profile]) -> ForgeResult<Vec<ProcessRecord>> {
        let mut records = Vec::new();
        for profile in profiles {
            for asset in AssetKind::all() {
                let tag = chain_tag(profile.name(), asset);
                if let Some(record) = self.find_component(asset.binary_name(), &tag)? {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    /// Guard consulted before any destructive or activation operation.
    pub fn ensure_not_running(&self, profile: &Profile, asset: AssetKind) -> ForgeResult<()> {
        let tag = chain_tag(profile.name(), asset);
        match self.find_component(asset.binary_name(), &tag)? {
            Some(record) => Err(ForgeError::ProcessStillRunning {
                component: record.component,
                pid: record.pid,
            }),
            None => Ok(()),
        }
    }

    /// Send SIGTERM (or SIGKILL with `force`) to a pid.
    pub fn signal(&self, pid: i32, force: bool) -> ForgeResult<()> {
        let signal = if force {
            Signal::SIGKILL
        } else {
            Signal::SIGTERM
        };
        kill(Pid::from_raw(pid), signal).map_err(|e| ForgeError::SignalFailed {
            pid,
            reason: e.to_string(),
        })?;
        tracing::info!(pid, ?signal, "signalled process");
        Ok(())
    }
}

/// Match by kernel comm (truncated to 15 chars) or argv[0] basename.
fn name_matches(comm: &str, cmdline: &[String], name: &str) -> bool {
    if comm == name {
        return true;
    }
    // comm is truncated; fall back to argv[0].
    cmdline
        .first()
        .map(|arg0| {
            Path::new(arg0)
                .file_name()
                .map(|f| f.to_string_lossy() == name)
                .unwrap_or(false)
        })
        .unwrap_or(false)
}

/// The tag may sit in the command line or in the launch environment.
fn tag_matches(proc: &Process, cmdline: &[String], tag: &str) -> bool {
    if cmdline.iter().any(|arg| arg.contains(tag)) {
        return true;
    }
    proc.environ()
        .map(|env| {
            env.values()
                .any(|value| value.to_string_lossy().contains(tag))
        })
        .unwrap_or(false)
}

fn sample_usage(proc: &Process) -> Option<ResourceUsage> {
    let stat = proc.stat().ok()?;
    let page_size = procfs::page_size();
    let ticks = procfs::ticks_per_second();

    Some(ResourceUsage {
        rss_bytes: stat.rss * page_size,
        vsize_bytes: stat.vsize,
        threads: stat.num_threads,
        cpu_time_secs: (stat.utime + stat.stime) / ticks.max(1),
    })
}

#[cfg(test)]
mod tests {
    use std::process::{Child, Command};

    use super::*;
    use crate::supervisor::tag::profile_hash;

    /// Spawn a shell whose command line carries `tag`.
    fn spawn_tagged_shell(tag: &str) -> Child {
        Command::new("sh")
            .arg("-c")
            .arg(format!("sleep 30 # {}", tag))
            .spawn()
            .unwrap()
    }

    fn reap(mut child: Child) {
        child.kill().ok();
        child.wait().ok();
    }

    #[test]
    fn test_find_component_by_cmdline_tag() {
        let tag = format!("forge-{}", profile_hash("registry-cmdline-test"));
        let child = spawn_tagged_shell(&tag);

        let registry = ProcessRegistry::new();
        let record = registry.find_component("sh", &tag).unwrap();

        let found = record.expect("tagged shell should be discoverable");
        assert_eq!(found.pid as u32, child.id());
        assert_eq!(found.component, "sh");
        assert_eq!(found.chain_tag, tag);

        reap(child);
    }

    #[test]
    fn test_find_component_by_environment_tag() {
        let tag = format!("forge-{}", profile_hash("registry-env-test"));
        let child = Command::new("sleep")
            .arg("30")
            .env("FORGE_CHAIN_TAG", &tag)
            .spawn()
            .unwrap();

        let registry = ProcessRegistry::new();
        let record = registry.find_component("sleep", &tag).unwrap();

        let found = record.expect("env-tagged sleep should be discoverable");
        assert_eq!(found.pid as u32, child.id());

        reap(child);
    }

    #[test]
    fn test_profiles_never_cross_resolve() {
        let alpha_tag = format!("forge-{}", profile_hash("alpha-isolation"));
        let beta_tag = format!("forge-{}", profile_hash("beta-isolation"));
        let alpha = spawn_tagged_shell(&alpha_tag);
        let beta = spawn_tagged_shell(&beta_tag);

        let registry = ProcessRegistry::new();
        let found_alpha = registry.find_component("sh", &alpha_tag).unwrap().unwrap();
        let found_beta = registry.find_component("sh", &beta_tag).unwrap().unwrap();

        assert_eq!(found_alpha.pid as u32, alpha.id());
        assert_eq!(found_beta.pid as u32, beta.id());
        assert_ne!(found_alpha.pid, found_beta.pid);

        reap(alpha);
        reap(beta);
    }

    #[test]
    fn test_find_component_absent() {
        let registry = ProcessRegistry::new();
        let tag = format!("forge-{}", profile_hash("no-such-profile-anywhere"));
        assert!(registry.find_component("sh", &tag).unwrap().is_none());
    }

    #[test]
    fn test_usage_sample_is_present_for_own_process() {
        let tag = format!("forge-{}", profile_hash("registry-usage-test"));
        let child = spawn_tagged_shell(&tag);

        let registry = ProcessRegistry::new();
        let record = registry.find_component("sh", &tag).unwrap().unwrap();
        let usage = record.usage.expect("own child should be sampleable");
        assert!(usage.rss_bytes > 0);
        assert!(usage.threads >= 1);

        reap(child);
    }

    #[test]
    fn test_list_all_empty_for_idle_profile() {
        let registry = ProcessRegistry::new();
        let profile = Profile::new("idle-profile-xyz", "/tmp/idle-profile-xyz");
        assert!(registry.list_all(&[profile]).unwrap().is_empty());
    }

    #[test]
    fn test_ensure_not_running_passes_for_idle_profile() {
        let registry = ProcessRegistry::new();
        let profile = Profile::new("idle-profile-abc", "/tmp/idle-profile-abc");
        registry
            .ensure_not_running(&profile, AssetKind::Node)
            .unwrap();
    }

    #[test]
    fn test_signal_unknown_pid_fails() {
        let registry = ProcessRegistry::new();
        // Pid beyond any plausible pid_max.
        let err = registry.signal(i32::MAX - 1, false).unwrap_err();
        assert!(matches!(err, ForgeError::SignalFailed { .. }));
    }
}
