//! Data models shared by the node's processes.
//!
//! - [`Locations`] - the per-user directory of devices currently online
//! - [`LocationEntry`] - one device in that directory
//! - [`Versioned`] - a value read from the DHT together with its version
//! - [`PersistentMeta`] - what a node writes to disk at logout

mod locations;
mod meta;

pub use locations::{LocationEntry, Locations, Versioned};
pub use meta::PersistentMeta;
