//! Peer liveness round and master election.
//!
//! The node probes every device listed in the stale directory, keeps those
//! that answer within the contact window and elects the smallest address of
//! the survivors (itself included) as master. Silent devices are dropped,
//! never reported as errors.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use peerdrive_dht::PeerAddress;
use peerdrive_process::{ProcessContext, ProcessStep, RollbackReason};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, info};

use super::LoginData;
use crate::election;
use crate::models::{LocationEntry, Locations};
use crate::network::{PeerMessenger, ProbeOutcome};
use crate::session::{Session, SessionProvider};

/// Outcome of one liveness round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactResult {
    /// Own address plus every peer that answered in time.
    pub locations: Locations,
    /// Whether the local node won the election over `locations`.
    pub is_master: bool,
    /// Candidates that did not answer in time.
    pub unreachable: Vec<PeerAddress>,
}

#[derive(Debug, Default)]
struct Replies {
    alive: BTreeSet<PeerAddress>,
    resolved: BTreeSet<PeerAddress>,
    sealed: bool,
}

/// Replies of one round, recorded concurrently by the probe tasks.
///
/// Each peer counts once no matter how often it answers. Once sealed, late
/// replies are dropped.
#[derive(Debug)]
pub struct ReplyCollector {
    expected: usize,
    replies: Mutex<Replies>,
    complete: Notify,
}

impl ReplyCollector {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            replies: Mutex::new(Replies::default()),
            complete: Notify::new(),
        }
    }

    /// Record a probe result. Returns false for duplicates and late replies.
    pub fn record(&self, peer: PeerAddress, outcome: ProbeOutcome) -> bool {
        let mut replies = self.replies.lock();
        if replies.sealed || !replies.resolved.insert(peer) {
            return false;
        }
        if outcome == ProbeOutcome::Alive {
            replies.alive.insert(peer);
        }
        if replies.resolved.len() >= self.expected {
            self.complete.notify_one();
        }
        true
    }

    /// Whether every expected peer has resolved.
    pub fn is_complete(&self) -> bool {
        self.replies.lock().resolved.len() >= self.expected
    }

    /// Resolve once every expected peer has resolved.
    pub async fn wait_complete(&self) {
        while !self.is_complete() {
            self.complete.notified().await;
        }
    }

    /// Stop accepting replies and return the peers that answered alive.
    pub fn seal(&self) -> BTreeSet<PeerAddress> {
        let mut replies = self.replies.lock();
        replies.sealed = true;
        replies.alive.clone()
    }
}

/// Run one liveness round for `session` over the devices in `stale`.
pub async fn contact_peers(
    session: &Session,
    stale: &Locations,
    messenger: Arc<dyn PeerMessenger>,
    window: Duration,
) -> ContactResult {
    let own = session.own_address;
    let candidates: Vec<PeerAddress> = stale.addresses().filter(|a| **a != own).copied().collect();

    let collector = Arc::new(ReplyCollector::new(candidates.len()));
    let mut probes = JoinSet::new();
    for peer in &candidates {
        let peer = *peer;
        let user_id = session.user_id.clone();
        let messenger = Arc::clone(&messenger);
        let collector = Arc::clone(&collector);
        probes.spawn(async move {
            let outcome = messenger.probe(&user_id, &peer).await;
            debug!("Probe {} -> {:?}", peer, outcome);
            collector.record(peer, outcome);
        });
    }

    if !candidates.is_empty()
        && tokio::time::timeout(window, collector.wait_complete())
            .await
            .is_err()
    {
        debug!("Contact window of {:?} elapsed", window);
    }
    let alive = collector.seal();
    probes.abort_all();

    let mut locations = Locations::new(session.user_id.clone());
    locations.add_entry(LocationEntry::new(own));
    for peer in &alive {
        locations.add_entry(LocationEntry::new(*peer));
    }

    let is_master = election::is_master(&own, locations.addresses());
    let unreachable: Vec<PeerAddress> = candidates.into_iter().filter(|c| !alive.contains(c)).collect();

    info!(
        user = %session.user_id,
        online = locations.len(),
        unreachable = unreachable.len(),
        is_master,
        "Peer contact finished"
    );

    ContactResult {
        locations,
        is_master,
        unreachable,
    }
}

/// Rebuild the user's directory from the devices that are still online.
///
/// Reads the stale directory from [`LoginData::stale`] and publishes a
/// [`ContactResult`] into [`LoginData::contact`]. Nothing is written to the
/// DHT, so there is nothing to roll back.
pub struct ContactPeersStep {
    sessions: SessionProvider,
    messenger: Arc<dyn PeerMessenger>,
    window: Duration,
}

impl ContactPeersStep {
    pub fn new(sessions: SessionProvider, messenger: Arc<dyn PeerMessenger>, window: Duration) -> Self {
        Self {
            sessions,
            messenger,
            window,
        }
    }
}

#[async_trait]
impl ProcessStep<LoginData> for ContactPeersStep {
    fn name(&self) -> &str {
        "contact-peers"
    }

    async fn execute(&mut self, ctx: &mut ProcessContext<LoginData>) -> Result<(), RollbackReason> {
        let session = self
            .sessions
            .current()
            .map_err(|e| ctx.fail("cannot contact peers").with_cause(e))?;

        let stale = ctx
            .data()
            .stale
            .clone()
            .unwrap_or_else(|| Locations::new(session.user_id.clone()));

        let result = contact_peers(&session, &stale, Arc::clone(&self.messenger), self.window).await;
        ctx.data_mut().contact = Some(result);
        Ok(())
    }
}
