//! In-process network for tests and single-host simulations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use peerdrive_dht::PeerAddress;

use super::{PeerMessenger, ProbeOutcome};

/// How a simulated peer treats probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerBehavior {
    /// Answers immediately.
    Responsive,
    /// Receives probes but never answers.
    Denying,
    /// Answers after the given delay.
    Delayed(Duration),
}

/// A set of simulated peers. Clones share the set.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNetwork {
    peers: Arc<RwLock<HashMap<PeerAddress, PeerBehavior>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer, or change how an existing one behaves.
    pub fn set_peer(&self, address: PeerAddress, behavior: PeerBehavior) {
        self.peers.write().insert(address, behavior);
    }

    /// Take a peer off the network. Probes to it fail immediately.
    pub fn remove_peer(&self, address: &PeerAddress) {
        self.peers.write().remove(address);
    }

    pub fn messenger(&self) -> InMemoryMessenger {
        InMemoryMessenger {
            network: self.clone(),
        }
    }

    fn behavior(&self, address: &PeerAddress) -> Option<PeerBehavior> {
        self.peers.read().get(address).copied()
    }
}

/// [`PeerMessenger`] over an [`InMemoryNetwork`].
#[derive(Debug, Clone)]
pub struct InMemoryMessenger {
    network: InMemoryNetwork,
}

#[async_trait]
impl PeerMessenger for InMemoryMessenger {
    async fn probe(&self, _user_id: &str, peer: &PeerAddress) -> ProbeOutcome {
        match self.network.behavior(peer) {
            None => ProbeOutcome::Unreachable,
            Some(PeerBehavior::Responsive) => ProbeOutcome::Alive,
            Some(PeerBehavior::Denying) => std::future::pending().await,
            Some(PeerBehavior::Delayed(delay)) => {
                tokio::time::sleep(delay).await;
                ProbeOutcome::Alive
            }
        }
    }
}
