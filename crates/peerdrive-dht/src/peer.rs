//! Peer identity and addressing.
//!
//! A device is reached through a [`PeerAddress`]: the stable [`PeerId`] of
//! the device plus the socket it currently listens on. Addresses have a total
//! order (peer id bytes first, socket second) so every device sorting the same
//! set of addresses arrives at the same sequence without talking to anyone.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Unique peer identifier (256-bit hash of public key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash a public key to create a PeerId.
    pub fn from_public_key(pubkey: &[u8]) -> Self {
        let hash = blake3::hash(pubkey);
        Self(*hash.as_bytes())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}...", &self.to_hex()[..8])
    }
}

/// Where a peer can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddress {
    /// Stable device identity. Compared first.
    pub peer_id: PeerId,
    /// Current listen socket.
    pub socket: SocketAddr,
}

impl PeerAddress {
    pub fn new(peer_id: PeerId, socket: SocketAddr) -> Self {
        Self { peer_id, socket }
    }
}

impl std::fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.peer_id, self.socket)
    }
}
