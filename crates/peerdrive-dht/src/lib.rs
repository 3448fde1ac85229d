//! Peerdrive Distributed Hash Table
//!
//! The storage primitives shared by every peerdrive device: Blake3 keys,
//! entries carrying a per-key version, and the peer addressing used to reach
//! other devices.
//!
//! # Versioned writes
//!
//! Every successful write bumps the key's version by one. Writers that read a
//! value, modify it, and write it back pass the version they read to
//! [`DhtState::put_versioned`]; a concurrent writer that got there first makes
//! the write fail with [`DhtError::VersionConflict`] instead of silently
//! overwriting.

mod entry;
mod error;
mod peer;
mod state;

pub use entry::{DhtEntry, DhtKey, DhtValue};
pub use error::{DhtError, Result};
pub use peer::{PeerAddress, PeerId};
pub use state::DhtState;

/// Hash arbitrary bytes to a DHT key using Blake3.
pub fn hash_key(data: &[u8]) -> DhtKey {
    let hash = blake3::hash(data);
    DhtKey(*hash.as_bytes())
}

/// Hash a prefixed key (e.g., "locations:{user}") to a DHT key.
pub fn hash_prefixed_key(prefix: &str, id: &str) -> DhtKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prefix.as_bytes());
    hasher.update(b":");
    hasher.update(id.as_bytes());
    DhtKey(*hasher.finalize().as_bytes())
}
