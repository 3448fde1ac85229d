use std::collections::BTreeSet;

use peerdrive_dht::PeerAddress;
use serde::{Deserialize, Serialize};

use crate::election;

/// One device of a user, as recorded in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationEntry {
    address: PeerAddress,
}

impl LocationEntry {
    pub fn new(address: PeerAddress) -> Self {
        Self { address }
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }
}

impl From<PeerAddress> for LocationEntry {
    fn from(address: PeerAddress) -> Self {
        Self::new(address)
    }
}

/// The set of devices a user is believed to be logged in on.
///
/// Entries are kept sorted by address, which makes the snapshot comparable
/// across devices and the election a plain minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locations {
    user_id: String,
    entries: BTreeSet<LocationEntry>,
}

impl Locations {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            entries: BTreeSet::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Add a device. Returns false if it was already listed.
    pub fn add_entry(&mut self, entry: LocationEntry) -> bool {
        self.entries.insert(entry)
    }

    /// Remove a device. Returns false if it was not listed.
    pub fn remove_entry(&mut self, address: &PeerAddress) -> bool {
        self.entries.remove(&LocationEntry::new(*address))
    }

    pub fn contains(&self, address: &PeerAddress) -> bool {
        self.entries.contains(&LocationEntry::new(*address))
    }

    pub fn entries(&self) -> impl Iterator<Item = &LocationEntry> {
        self.entries.iter()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &PeerAddress> {
        self.entries.iter().map(LocationEntry::address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The device every member agrees coordinates this user.
    pub fn master(&self) -> Option<&PeerAddress> {
        election::elect_master(self.addresses())
    }
}

/// A value together with the DHT version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }
}
