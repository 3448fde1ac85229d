//! Peer liveness probing.
//!
//! A probe asks one device "is `user_id` logged in on you?". Devices that are
//! offline, or hold a different session, never answer; the caller's window
//! decides when to give up on them.

mod memory;
mod tcp;

use async_trait::async_trait;
use peerdrive_dht::PeerAddress;
use serde::{Deserialize, Serialize};

pub use memory::{InMemoryMessenger, InMemoryNetwork, PeerBehavior};
pub use tcp::{ProbeServer, TcpMessenger};

/// Result of probing one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The peer answered for the same user.
    Alive,
    /// The peer is known to be unreachable (refused, closed, wrong answer).
    Unreachable,
}

/// Sends liveness probes.
///
/// `probe` may never resolve for a silent peer. Callers bound it with a timeout.
#[async_trait]
pub trait PeerMessenger: Send + Sync {
    async fn probe(&self, user_id: &str, peer: &PeerAddress) -> ProbeOutcome;
}

/// Line-delimited JSON messages of the probe protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    AliveRequest { user_id: String },
    AliveResponse { peer: PeerAddress },
}
