//! Post-login process: refresh the directory and the master role.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use peerdrive_process::{Process, ProcessContext, ProcessStep, RollbackReason, SequentialProcess};
use tracing::{info, warn};

use super::{ContactPeersStep, ContactResult};
use crate::error::Error;
use crate::models::Locations;
use crate::network::PeerMessenger;
use crate::session::SessionProvider;
use crate::storage::DirectoryStorage;

/// Scratch data of the post-login process.
#[derive(Debug, Default)]
pub struct LoginData {
    /// Directory as last stored in the DHT.
    pub stale: Option<Locations>,
    /// Version of `stale`, `None` if the user had no directory yet.
    pub stale_version: Option<u64>,
    /// Result of the liveness round.
    pub contact: Option<ContactResult>,
    /// Version written by [`PutLocationsStep`].
    pub written_version: Option<u64>,
}

impl LoginData {
    pub fn with_stale(stale: Locations) -> Self {
        Self {
            stale: Some(stale),
            ..Self::default()
        }
    }
}

/// Load the stored directory. A user without one starts from an empty set.
pub struct GetLocationsStep {
    sessions: SessionProvider,
    storage: Arc<dyn DirectoryStorage>,
}

impl GetLocationsStep {
    pub fn new(sessions: SessionProvider, storage: Arc<dyn DirectoryStorage>) -> Self {
        Self { sessions, storage }
    }
}

#[async_trait]
impl ProcessStep<LoginData> for GetLocationsStep {
    fn name(&self) -> &str {
        "get-locations"
    }

    async fn execute(&mut self, ctx: &mut ProcessContext<LoginData>) -> Result<(), RollbackReason> {
        let session = self
            .sessions
            .current()
            .map_err(|e| ctx.fail("cannot read locations").with_cause(e))?;

        let (stale, version) = match self.storage.read_locations(&session.user_id).await {
            Ok(read) => (read.value, Some(read.version)),
            Err(Error::NotFound(_)) => {
                info!("No locations stored for {}, starting fresh", session.user_id);
                (Locations::new(session.user_id.clone()), None)
            }
            Err(e) => return Err(ctx.fail("cannot read locations").with_cause(e)),
        };

        let data = ctx.data_mut();
        data.stale = Some(stale);
        data.stale_version = version;
        Ok(())
    }
}

/// Store the rebuilt directory and take on the elected role.
///
/// The write names the version read by [`GetLocationsStep`]; a concurrent
/// login on another device makes it fail with a version conflict, which fails
/// the process. Rollback puts the stale directory back.
pub struct PutLocationsStep {
    sessions: SessionProvider,
    storage: Arc<dyn DirectoryStorage>,
}

impl PutLocationsStep {
    pub fn new(sessions: SessionProvider, storage: Arc<dyn DirectoryStorage>) -> Self {
        Self { sessions, storage }
    }
}

#[async_trait]
impl ProcessStep<LoginData> for PutLocationsStep {
    fn name(&self) -> &str {
        "put-locations"
    }

    async fn execute(&mut self, ctx: &mut ProcessContext<LoginData>) -> Result<(), RollbackReason> {
        let Some(contact) = ctx.data().contact.clone() else {
            return Err(ctx.fail("no peer contact result to store"));
        };

        let version = self
            .storage
            .write_locations(&contact.locations, ctx.data().stale_version)
            .await
            .map_err(|e| ctx.fail("cannot store locations").with_cause(e))?;

        ctx.data_mut().written_version = Some(version);
        self.sessions.set_master(contact.is_master);
        if contact.is_master {
            info!("This node is the master for {}", contact.locations.user_id());
        }
        Ok(())
    }

    async fn rollback(&mut self, ctx: &mut ProcessContext<LoginData>) -> Result<(), RollbackReason> {
        let Some(written) = ctx.data_mut().written_version.take() else {
            return Ok(());
        };
        self.sessions.set_master(false);

        let Some(stale) = ctx.data().stale.clone() else {
            return Ok(());
        };
        warn!("Restoring previous locations of {}", stale.user_id());
        self.storage
            .write_locations(&stale, Some(written))
            .await
            .map(|_| ())
            .map_err(|e| ctx.fail("cannot restore locations").with_cause(e))
    }
}

/// Build the process run after a user logged in on this node.
pub fn post_login_process(
    sessions: SessionProvider,
    storage: Arc<dyn DirectoryStorage>,
    messenger: Arc<dyn PeerMessenger>,
    contact_window: Duration,
) -> Process {
    let sequence = SequentialProcess::new("post-login")
        .with_step(GetLocationsStep::new(sessions.clone(), Arc::clone(&storage)))
        .with_step(ContactPeersStep::new(sessions.clone(), messenger, contact_window))
        .with_step(PutLocationsStep::new(sessions, storage));
    Process::new(sequence, LoginData::default())
}
