//! Port allocation across profiles.
//!
//! A candidate port is acceptable only when it is absent from every
//! profile's `[ports]` config for the service class **and** actually binds
//! on the OS. Config absence alone is not enough: unrelated processes may
//! hold a port no profile knows about. Allocation scans the class's
//! preferred range sequentially.

use std::collections::HashSet;
use std::fmt;
use std::net::TcpListener;
use std::path::PathBuf;

use crate::error::{ForgeError, ForgeResult};
use crate::profile::Profile;

/// Service classes with a preferred port range each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceClass {
    /// Node p2p listener.
    Node,
    /// JSON-RPC endpoint.
    Rpc,
    /// Web console.
    Web,
}

impl ServiceClass {
    /// Key used in `forge.ini` `[ports]` sections.
    pub fn key(&self) -> &'static str {
        match self {
            ServiceClass::Node => "node",
            ServiceClass::Rpc => "rpc",
            ServiceClass::Web => "web",
        }
    }

    /// Preferred half-open port range `[start, end)`.
    pub fn preferred_range(&self) -> (u16, u16) {
        match self {
            ServiceClass::Node => (30300, 30400),
            ServiceClass::Rpc => (8545, 8645),
            ServiceClass::Web => (8210, 8310),
        }
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A port held by one profile for one service class. Derived on demand
/// from the profile configs, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAllocation {
    /// Service class key.
    pub service: String,
    /// The held port.
    pub port: u16,
    /// Owning profile name.
    pub profile: String,
}

/// Proposes collision-free ports for new profiles.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    base_dir: PathBuf,
}

impl PortAllocator {
    /// Create an allocator over the profiles under `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Current allocations across all profiles, for reporting.
    pub fn allocations(&self) -> ForgeResult<Vec<PortAllocation>> {
        let mut allocations = Vec::new();
        for profile in Profile::list(&self.base_dir) {
            for (service, port) in profile.ports()? {
                allocations.push(PortAllocation {
                    service,
                    port,
                    profile: profile.name().to_string(),
                });
            }
        }
        Ok(allocations)
    }

    /// Propose the next free port for a service class.
    ///
    /// Scans the preferred range in order, skipping ports any profile holds
    /// for this class, and returns the first remaining candidate that binds
    /// on the OS.
    pub fn next_free_port(&self, service: ServiceClass) -> ForgeResult<u16> {
        let held = self.held_ports(service)?;
        let (start, end) = service.preferred_range();

        for port in start..end {
            if held.contains(&port) {
                continue;
            }
            if os_port_is_free(port) {
                tracing::debug!(service = service.key(), port, "proposed free port");
                return Ok(port);
            }
        }

        Err(ForgeError::PortRangeExhausted {
            service: service.key().to_string(),
            start,
            end,
        })
    }

    fn held_ports(&self, service: ServiceClass) -> ForgeResult<HashSet<u16>> {
        let mut held = HashSet::new();
        for profile in Profile::list(&self.base_dir) {
            if let Some(port) = profile.ports()?.get(service.key()) {
                held.insert(*port);
            }
        }
        Ok(held)
    }
}

/// A port counts as free only if we can actually bind it right now.
fn os_port_is_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn seed_profile(base: &std::path::Path, name: &str, ports: &[(&str, u16)]) {
        let dir = base.join(name);
        fs::create_dir_all(&dir).unwrap();
        let mut config = String::from("[ports]\n");
        for (service, port) in ports {
            config.push_str(&format!("{} = {}\n", service, port));
        }
        fs::write(dir.join("forge.ini"), config).unwrap();
    }

    #[test]
    fn test_next_free_port_skips_config_held_ports() {
        let temp = TempDir::new().unwrap();
        seed_profile(temp.path(), "alpha", &[("web", 8210)]);
        seed_profile(temp.path(), "beta", &[("web", 8211)]);

        let allocator = PortAllocator::new(temp.path());
        let port = allocator.next_free_port(ServiceClass::Web).unwrap();
        assert!(port >= 8212, "got {}", port);
    }

    #[test]
    fn test_next_free_port_skips_os_bound_ports() {
        let temp = TempDir::new().unwrap();
        let allocator = PortAllocator::new(temp.path());

        // Hold the first proposal at the OS level, then ask again.
        let first = allocator.next_free_port(ServiceClass::Rpc).unwrap();
        let _listener = TcpListener::bind(("127.0.0.1", first)).unwrap();

        let second = allocator.next_free_port(ServiceClass::Rpc).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_next_free_port_ignores_other_service_classes() {
        let temp = TempDir::new().unwrap();
        // A node port inside the web numeric space must not block web.
        seed_profile(temp.path(), "alpha", &[("node", 8210)]);

        let allocator = PortAllocator::new(temp.path());
        let port = allocator.next_free_port(ServiceClass::Web).unwrap();
        // 8210 is held for "node", not "web"; only the bind probe can
        // exclude it.
        assert!(port >= 8210);
    }

    #[test]
    fn test_allocations_reports_all_profiles() {
        let temp = TempDir::new().unwrap();
        seed_profile(temp.path(), "alpha", &[("web", 8210), ("rpc", 8545)]);
        seed_profile(temp.path(), "beta", &[("web", 8211)]);

        let allocator = PortAllocator::new(temp.path());
        let mut allocations = allocator.allocations().unwrap();
        allocations.sort_by(|a, b| (a.profile.clone(), a.port).cmp(&(b.profile.clone(), b.port)));

        assert_eq!(allocations.len(), 3);
        assert_eq!(allocations[0].profile, "alpha");
        assert_eq!(allocations[2].profile, "beta");
        assert_eq!(allocations[2].port, 8211);
    }

    #[test]
    fn test_exhausted_range() {
        let temp = TempDir::new().unwrap();
        // Hold the entire web range in configs.
        let (start, end) = ServiceClass::Web.preferred_range();
        for (i, port) in (start..end).enumerate() {
            seed_profile(temp.path(), &format!("p{}", i), &[("web", port)]);
        }

        let allocator = PortAllocator::new(temp.path());
        let err = allocator.next_free_port(ServiceClass::Web).unwrap_err();
        assert!(matches!(err, ForgeError::PortRangeExhausted { .. }));
    }
}
