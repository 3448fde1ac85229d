//! Error types for the peerdrive node.

use peerdrive_dht::DhtError;
use peerdrive_process::ProcessError;
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in node operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No user is logged in on this node.
    #[error("no session: no user is logged in on this node")]
    NoSession,

    /// A user is already logged in on this node.
    #[error("a session for {0} is already active")]
    SessionActive(String),

    /// The requested DHT object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Another writer changed the object since it was read. Re-read and retry.
    #[error("version conflict: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        expected: Option<u64>,
        actual: Option<u64>,
    },

    /// Stored bytes could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Process framework error
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DhtError> for Error {
    fn from(e: DhtError) -> Self {
        match e {
            DhtError::VersionConflict {
                expected, actual, ..
            } => Error::VersionConflict { expected, actual },
            DhtError::Codec(e) => Error::Encoding(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerdrive_dht::hash_key;

    #[test]
    fn dht_conflict_maps_to_version_conflict() {
        let err: Error = DhtError::VersionConflict {
            key: hash_key(b"k"),
            expected: Some(1),
            actual: Some(2),
        }
        .into();
        assert!(matches!(
            err,
            Error::VersionConflict {
                expected: Some(1),
                actual: Some(2)
            }
        ));
    }
}
