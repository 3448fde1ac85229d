//! Node configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default contact window for the peer liveness round.
pub const DEFAULT_CONTACT_PEERS_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Configuration for a peerdrive node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Directory for node identity and per-user roots
    pub data_dir: PathBuf,
    /// Address the probe server listens on
    pub p2p_addr: SocketAddr,
    /// How long the login process waits for liveness replies
    pub contact_peers_timeout: Duration,
    /// Start processes as soon as they are built
    pub autostart: bool,
    /// Upper bound for waiting on a process from the binary
    pub max_process_wait: Duration,
    /// User to log in at startup
    pub user: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./peerdrive-data"),
            p2p_addr: SocketAddr::from(([0, 0, 0, 0], 9400)),
            contact_peers_timeout: DEFAULT_CONTACT_PEERS_TIMEOUT,
            autostart: true,
            max_process_wait: Duration::from_secs(30),
            user: None,
        }
    }
}

impl NodeConfig {
    /// Load configuration from `PEERDRIVE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let data_dir = lookup("PEERDRIVE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let p2p_addr = parse_var(&lookup, "PEERDRIVE_P2P_ADDR")?.unwrap_or(defaults.p2p_addr);

        let contact_peers_timeout = parse_var::<u64>(&lookup, "PEERDRIVE_CONTACT_PEERS_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.contact_peers_timeout);

        let autostart = parse_var(&lookup, "PEERDRIVE_AUTOSTART")?.unwrap_or(defaults.autostart);

        let max_process_wait = parse_var::<u64>(&lookup, "PEERDRIVE_MAX_PROCESS_WAIT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.max_process_wait);

        let user = lookup("PEERDRIVE_USER")
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        Ok(Self {
            data_dir,
            p2p_addr,
            contact_peers_timeout,
            autostart,
            max_process_wait,
            user,
        })
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_p2p_addr(mut self, addr: SocketAddr) -> Self {
        self.p2p_addr = addr;
        self
    }

    pub fn with_contact_peers_timeout(mut self, timeout: Duration) -> Self {
        self.contact_peers_timeout = timeout;
        self
    }

    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// Root directory for a user's files on this node.
    pub fn user_root(&self, user_id: &str) -> PathBuf {
        self.data_dir.join(user_id)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name} has an invalid value: {raw:?}"))),
    }
}
