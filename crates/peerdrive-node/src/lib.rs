//! Peerdrive Node - one device of a user's personal sync group
//!
//! Every device a user logs in on runs a node. The devices share no server;
//! they find each other through a per-user `Locations` directory stored in the
//! DHT and agree on a coordinating device without exchanging votes.
//!
//! # Architecture
//!
//! - **Models**: `Locations` directory, persisted session metadata
//! - **Storage**: directory reads/writes over the DHT with optimistic versions
//! - **Network**: liveness probes (in-memory network and TCP)
//! - **Processes**: post-login (rebuild directory, elect master, persist) and
//!   logout, built on `peerdrive-process`
//! - **Node**: the facade that owns the session and the running processes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use peerdrive_node::{NodeConfig, PeerNode, DhtDirectory, TcpMessenger};
//! use peerdrive_process::Waiter;
//!
//! # async fn demo(address: peerdrive_dht::PeerAddress) -> Result<(), Box<dyn std::error::Error>> {
//! let config = NodeConfig::from_env()?;
//! let node = PeerNode::new(
//!     config,
//!     address,
//!     Arc::new(DhtDirectory::default()),
//!     Arc::new(TcpMessenger::default()),
//! );
//! let login = node.login("alice", "./alice".into())?;
//! login.wait(Waiter::from_secs(30)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod election;
pub mod error;
pub mod identity;
pub mod models;
pub mod network;
pub mod node;
pub mod processes;
pub mod session;
pub mod storage;

pub use config::NodeConfig;
pub use error::{Error, Result};
pub use models::{LocationEntry, Locations, PersistentMeta, Versioned};
pub use network::{InMemoryNetwork, PeerBehavior, PeerMessenger, ProbeOutcome, ProbeServer, TcpMessenger};
pub use node::{NodeStatus, PeerNode};
pub use session::{Session, SessionProvider};
pub use storage::{DhtDirectory, DirectoryStorage};
