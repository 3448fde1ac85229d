//! Directory storage over the DHT.
//!
//! A user's [`Locations`] live under one DHT key. Writers must name the version
//! they read; a stale writer gets [`Error::VersionConflict`] instead of silently
//! replacing someone else's update.

use std::sync::Arc;

use async_trait::async_trait;
use peerdrive_dht::{hash_prefixed_key, DhtKey, DhtState, DhtValue};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Locations, Versioned};

/// Reads and writes the per-user device directory.
#[async_trait]
pub trait DirectoryStorage: Send + Sync {
    /// Current directory of `user_id`, or [`Error::NotFound`].
    async fn read_locations(&self, user_id: &str) -> Result<Versioned<Locations>>;

    /// Store `locations` if the stored version is still `expected`
    /// (`None` = no directory yet). Returns the new version.
    async fn write_locations(&self, locations: &Locations, expected: Option<u64>) -> Result<u64>;
}

/// [`DirectoryStorage`] backed by a DHT replica.
///
/// Clones share the replica, so several nodes built from clones of one
/// directory see each other's writes.
#[derive(Debug, Clone, Default)]
pub struct DhtDirectory {
    dht: Arc<RwLock<DhtState>>,
}

impl DhtDirectory {
    pub fn new(dht: Arc<RwLock<DhtState>>) -> Self {
        Self { dht }
    }

    pub fn state(&self) -> Arc<RwLock<DhtState>> {
        self.dht.clone()
    }

    fn key_for(user_id: &str) -> DhtKey {
        hash_prefixed_key("locations", user_id)
    }
}

#[async_trait]
impl DirectoryStorage for DhtDirectory {
    async fn read_locations(&self, user_id: &str) -> Result<Versioned<Locations>> {
        let key = Self::key_for(user_id);
        let dht = self.dht.read().await;
        let entry = dht
            .get(&key)
            .ok_or_else(|| Error::NotFound(format!("locations of {user_id}")))?;

        let locations: Locations = bincode::deserialize(entry.value.as_bytes())?;
        Ok(Versioned::new(locations, entry.version))
    }

    async fn write_locations(&self, locations: &Locations, expected: Option<u64>) -> Result<u64> {
        let key = Self::key_for(locations.user_id());
        let value = DhtValue::new(bincode::serialize(locations)?);

        let version = self.dht.write().await.put_versioned(key, value, expected)?;
        debug!(
            user = locations.user_id(),
            entries = locations.len(),
            version,
            "Wrote locations"
        );
        Ok(version)
    }
}
