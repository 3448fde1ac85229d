use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use peerdrive_dht::PeerAddress;
use serde::{Deserialize, Serialize};

use super::Locations;

const META_DIR: &str = ".peerdrive";
const META_FILE: &str = "meta.json";

/// Node metadata written to the user's root when they log out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentMeta {
    pub user_id: String,
    pub own_address: PeerAddress,
    /// Directory snapshot as last written by this node
    pub last_locations: Option<Locations>,
    /// Unix millis
    pub written_at: u64,
}

impl PersistentMeta {
    pub fn new(user_id: impl Into<String>, own_address: PeerAddress, last_locations: Option<Locations>) -> Self {
        let written_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            user_id: user_id.into(),
            own_address,
            last_locations,
            written_at,
        }
    }

    /// `<root>/.peerdrive/meta.json`
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(META_DIR).join(META_FILE)
    }
}
