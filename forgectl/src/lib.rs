//! forgectl - Release management and process supervision for forge chain nodes
//!
//! This library installs versioned releases of the forge node and its
//! companion assets into per-chain profiles, and supervises the processes
//! those profiles run:
//!
//! - [`release`] resolves, downloads, extracts, and activates releases
//! - [`supervisor`] discovers and controls component processes and
//!   allocates collision-free ports across profiles
//! - [`ops`] wraps anything destructive in guarded operations
//!
//! All state lives in the filesystem (profile trees, activation pointers)
//! or the OS process table; the library itself keeps no daemon and no
//! database.

pub mod config;
pub mod error;
pub mod ops;
pub mod profile;
pub mod release;
pub mod supervisor;

pub use config::{ForgeConfig, MirrorLocation};
pub use error::{ForgeError, ForgeResult};
pub use profile::Profile;
