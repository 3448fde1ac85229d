//! The node facade.

use std::path::PathBuf;
use std::sync::Arc;

use peerdrive_dht::PeerAddress;
use peerdrive_process::{OnFinished, Process, ProcessManager};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::NodeConfig;
use crate::error::Result;
use crate::network::{PeerMessenger, ProbeServer};
use crate::processes::{logout_process, post_login_process};
use crate::session::{Session, SessionProvider};
use crate::storage::DirectoryStorage;

/// Snapshot of what a node is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub address: PeerAddress,
    pub user_id: Option<String>,
    pub is_master: bool,
    pub running_processes: usize,
}

/// A peerdrive node. Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct PeerNode {
    config: NodeConfig,
    address: PeerAddress,
    sessions: SessionProvider,
    storage: Arc<dyn DirectoryStorage>,
    messenger: Arc<dyn PeerMessenger>,
    processes: ProcessManager,
}

impl PeerNode {
    pub fn new(
        config: NodeConfig,
        address: PeerAddress,
        storage: Arc<dyn DirectoryStorage>,
        messenger: Arc<dyn PeerMessenger>,
    ) -> Self {
        Self {
            config,
            address,
            sessions: SessionProvider::new(),
            storage,
            messenger,
            processes: ProcessManager::new(),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn address(&self) -> PeerAddress {
        self.address
    }

    pub fn sessions(&self) -> &SessionProvider {
        &self.sessions
    }

    pub fn processes(&self) -> &ProcessManager {
        &self.processes
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            address: self.address,
            user_id: self.sessions.current().ok().map(|s| s.user_id),
            is_master: self.sessions.is_master(),
            running_processes: self.processes.len(),
        }
    }

    /// Log `user_id` in and build the post-login process.
    ///
    /// The process is started right away when `autostart` is configured;
    /// otherwise the caller starts it.
    pub fn login(&self, user_id: &str, root: PathBuf) -> Result<Process> {
        self.sessions
            .begin(Session::new(user_id, self.address, root))?;
        info!("Logged in {} on {}", user_id, self.address);

        let process = post_login_process(
            self.sessions.clone(),
            Arc::clone(&self.storage),
            Arc::clone(&self.messenger),
            self.config.contact_peers_timeout,
        );
        if let Err(e) = self.launch(&process) {
            self.sessions.clear();
            return Err(e);
        }
        Ok(process)
    }

    /// Build the logout process.
    ///
    /// Once it finished, successfully or not, every outstanding process is
    /// marked for rollback and the session is dropped.
    pub fn logout(&self) -> Result<Process> {
        let session = self.sessions.current()?;
        info!("Logging out {}", session.user_id);

        let process = logout_process(self.sessions.clone(), Arc::clone(&self.storage));
        let processes = self.processes.clone();
        let sessions = self.sessions.clone();
        process.attach_listener(Arc::new(OnFinished(move || {
            processes.stop_all("user logged out");
            if let Some(session) = sessions.clear() {
                info!("Session of {} closed", session.user_id);
            }
        })));

        self.launch(&process)?;
        Ok(process)
    }

    /// Answer liveness probes on `listener` until it fails.
    pub async fn serve_probes(&self, listener: TcpListener) -> Result<()> {
        ProbeServer::new(self.address, self.sessions.clone())
            .run(listener)
            .await
    }

    fn launch(&self, process: &Process) -> Result<()> {
        self.processes.register(process);
        if self.config.autostart {
            process.start()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PeerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerNode")
            .field("address", &self.address)
            .field("sessions", &self.sessions)
            .field("processes", &self.processes)
            .finish()
    }
}
