//! Logout process: leave the directory and persist node metadata.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use peerdrive_process::{Process, ProcessContext, ProcessStep, RollbackReason, SequentialProcess};
use tracing::{debug, info};

use crate::error::Error;
use crate::models::{LocationEntry, Locations, PersistentMeta};
use crate::session::SessionProvider;
use crate::storage::DirectoryStorage;

/// Scratch data of the logout process.
#[derive(Debug, Default)]
pub struct LogoutData {
    /// Directory without this node.
    pub remaining: Option<Locations>,
    /// Version written when this node's entry was removed.
    pub removed_version: Option<u64>,
    /// Metadata file written by [`WritePersistentStep`].
    pub meta_path: Option<PathBuf>,
}

/// Remove this node's entry from the user's directory.
pub struct RemoveOwnLocationStep {
    sessions: SessionProvider,
    storage: Arc<dyn DirectoryStorage>,
}

impl RemoveOwnLocationStep {
    pub fn new(sessions: SessionProvider, storage: Arc<dyn DirectoryStorage>) -> Self {
        Self { sessions, storage }
    }
}

#[async_trait]
impl ProcessStep<LogoutData> for RemoveOwnLocationStep {
    fn name(&self) -> &str {
        "remove-own-location"
    }

    async fn execute(&mut self, ctx: &mut ProcessContext<LogoutData>) -> Result<(), RollbackReason> {
        let session = self
            .sessions
            .current()
            .map_err(|e| ctx.fail("cannot leave directory").with_cause(e))?;

        let read = match self.storage.read_locations(&session.user_id).await {
            Ok(read) => read,
            Err(Error::NotFound(_)) => {
                debug!("No locations stored for {}", session.user_id);
                return Ok(());
            }
            Err(e) => return Err(ctx.fail("cannot read locations").with_cause(e)),
        };

        let mut locations = read.value;
        if !locations.remove_entry(&session.own_address) {
            ctx.data_mut().remaining = Some(locations);
            return Ok(());
        }

        let version = self
            .storage
            .write_locations(&locations, Some(read.version))
            .await
            .map_err(|e| ctx.fail("cannot store locations").with_cause(e))?;
        info!(
            user = %session.user_id,
            remaining = locations.len(),
            "Removed own location"
        );
        let data = ctx.data_mut();
        data.remaining = Some(locations);
        data.removed_version = Some(version);
        Ok(())
    }

    async fn rollback(&mut self, ctx: &mut ProcessContext<LogoutData>) -> Result<(), RollbackReason> {
        let Some(version) = ctx.data_mut().removed_version.take() else {
            return Ok(());
        };
        let Some(mut locations) = ctx.data().remaining.clone() else {
            return Ok(());
        };
        let session = self
            .sessions
            .current()
            .map_err(|e| ctx.fail("cannot rejoin directory").with_cause(e))?;

        if !locations.add_entry(LocationEntry::new(session.own_address)) {
            return Ok(());
        }
        self.storage
            .write_locations(&locations, Some(version))
            .await
            .map(|_| ())
            .map_err(|e| ctx.fail("cannot rejoin directory").with_cause(e))
    }
}

/// Write [`PersistentMeta`] to `<root>/.peerdrive/meta.json`.
pub struct WritePersistentStep {
    sessions: SessionProvider,
}

impl WritePersistentStep {
    pub fn new(sessions: SessionProvider) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl ProcessStep<LogoutData> for WritePersistentStep {
    fn name(&self) -> &str {
        "write-persistent"
    }

    async fn execute(&mut self, ctx: &mut ProcessContext<LogoutData>) -> Result<(), RollbackReason> {
        let session = self
            .sessions
            .current()
            .map_err(|e| ctx.fail("cannot write metadata").with_cause(e))?;

        let last_locations = ctx.data().remaining.clone();
        let meta = PersistentMeta::new(session.user_id.clone(), session.own_address, last_locations);
        let path = PersistentMeta::path_in(&session.root);

        let write = async {
            if let Some(dir) = path.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            let json = serde_json::to_vec_pretty(&meta)?;
            tokio::fs::write(&path, json).await?;
            Ok::<_, Error>(())
        };
        write
            .await
            .map_err(|e| ctx.fail("cannot write metadata").with_cause(e))?;

        debug!("Wrote metadata to {}", path.display());
        ctx.data_mut().meta_path = Some(path);
        Ok(())
    }

    async fn rollback(&mut self, ctx: &mut ProcessContext<LogoutData>) -> Result<(), RollbackReason> {
        let Some(path) = ctx.data_mut().meta_path.take() else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ctx.fail("cannot remove metadata").with_cause(e)),
        }
    }
}

/// Build the process run when the user logs out of this node.
pub fn logout_process(sessions: SessionProvider, storage: Arc<dyn DirectoryStorage>) -> Process {
    let sequence = SequentialProcess::new("logout")
        .with_step(RemoveOwnLocationStep::new(sessions.clone(), storage))
        .with_step(WritePersistentStep::new(sessions));
    Process::new(sequence, LogoutData::default())
}
