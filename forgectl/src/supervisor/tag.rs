//! Chain tags.
//!
//! Every supervised process carries a tag derived from its profile name,
//! embedded in its command line or environment by the launcher:
//!
//! - `forge-<hash>` for the primary component (the node itself)
//! - `forge-<component>-<hash>` for secondary components
//!
//! The hash is the first 8 hex characters of the profile name's SHA-256
//! digest, so identically-named binaries from different profiles never
//! collide while the tag stays short enough for a command line.

use sha2::{Digest, Sha256};

use crate::release::asset::AssetKind;

/// Tag prefix shared by all supervised processes.
pub const TAG_PREFIX: &str = "forge";

/// Length of the profile hash embedded in tags.
const HASH_LEN: usize = 8;

/// Short deterministic hash of a profile name.
pub fn profile_hash(profile_name: &str) -> String {
    let digest = Sha256::digest(profile_name.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..HASH_LEN].to_string()
}

/// The tag a component of a profile must carry.
pub fn chain_tag(profile_name: &str, asset: AssetKind) -> String {
    let hash = profile_hash(profile_name);
    if asset.is_primary() {
        format!("{}-{}", TAG_PREFIX, hash)
    } else {
        format!("{}-{}-{}", TAG_PREFIX, asset.component_name(), hash)
    }
}
