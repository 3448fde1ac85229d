//! Persistent device identity.
//!
//! A node keeps a random 32-byte key in `<data_dir>/identity.key` (hex). The
//! [`PeerId`] is the hash of that key, so it survives restarts.

use std::path::Path;

use peerdrive_dht::PeerId;
use rand::RngCore;
use tracing::info;

use crate::error::{Error, Result};

const IDENTITY_FILE: &str = "identity.key";

/// Load the device key from `data_dir`, creating one on first start.
pub fn load_or_create(data_dir: &Path) -> Result<PeerId> {
    let path = data_dir.join(IDENTITY_FILE);

    if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        let key = hex::decode(raw.trim())
            .map_err(|e| Error::Config(format!("corrupt identity file {}: {e}", path.display())))?;
        return Ok(PeerId::from_public_key(&key));
    }

    std::fs::create_dir_all(data_dir)?;
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    std::fs::write(&path, hex::encode(key))?;

    let peer_id = PeerId::from_public_key(&key);
    info!("Created device identity {}", peer_id);
    Ok(peer_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_stable_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_create(dir.path()).unwrap();
        let second = load_or_create(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_directories_get_distinct_ids() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        assert_ne!(load_or_create(a.path()).unwrap(), load_or_create(b.path()).unwrap());
    }

    #[test]
    fn test_corrupt_identity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(IDENTITY_FILE), "not hex").unwrap();
        assert!(matches!(load_or_create(dir.path()), Err(Error::Config(_))));
    }
}
