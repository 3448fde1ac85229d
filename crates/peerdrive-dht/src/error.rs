//! Error types for peerdrive-dht.

use thiserror::Error;

use crate::DhtKey;

/// Result type for DHT operations.
pub type Result<T> = std::result::Result<T, DhtError>;

/// Errors that can occur in DHT operations.
#[derive(Debug, Error)]
pub enum DhtError {
    /// A compare-and-set write lost a race against another writer.
    #[error("version conflict on {key}: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        key: DhtKey,
        /// Version the writer based its update on (`None` = key must not exist).
        expected: Option<u64>,
        /// Version currently stored (`None` = key does not exist).
        actual: Option<u64>,
    },

    /// A stored value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}
