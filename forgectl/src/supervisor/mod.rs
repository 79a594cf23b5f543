//! Process supervision: discovery, tagging, ports, and bounded waits.
//!
//! Supervision never persists state. The OS process table is the only
//! authority on what runs (see [`registry`]); profile configs are the only
//! authority on which ports are held (see [`ports`]). Everything here is
//! recomputed per query.

pub mod ports;
pub mod registry;
pub mod tag;
pub mod wait;

pub use ports::{PortAllocation, PortAllocator, ServiceClass};
pub use registry::{ProcessRecord, ProcessRegistry, ResourceUsage};
pub use tag::{chain_tag, profile_hash};
pub use wait::wait_until;
