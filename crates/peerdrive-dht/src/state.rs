//! DHT state management.

use std::collections::HashMap;

use crate::{DhtEntry, DhtError, DhtKey, DhtValue, Result};

/// Local DHT state.
///
/// Stores the entries this node holds. Writes either overwrite
/// unconditionally ([`put`](Self::put)) or only when the stored version is
/// the one the writer last read ([`put_versioned`](Self::put_versioned)).
#[derive(Debug, Default)]
pub struct DhtState {
    entries: HashMap<DhtKey, DhtEntry>,
}

impl DhtState {
    /// Create empty state.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Get an entry by key.
    pub fn get(&self, key: &DhtKey) -> Option<&DhtEntry> {
        self.entries.get(key)
    }

    /// Current version of a key, if present.
    pub fn version(&self, key: &DhtKey) -> Option<u64> {
        self.entries.get(key).map(|e| e.version)
    }

    /// Write unconditionally. Returns the new version.
    pub fn put(&mut self, key: DhtKey, value: DhtValue) -> u64 {
        match self.entries.get_mut(&key) {
            Some(existing) => existing.overwrite(value),
            None => {
                self.entries.insert(key, DhtEntry::new(key, value));
                1
            }
        }
    }

    /// Compare-and-set write.
    ///
    /// `expected` is the version the caller read, or `None` if the caller
    /// saw no entry. The write only happens if the stored version still
    /// matches. Returns the new version.
    pub fn put_versioned(
        &mut self,
        key: DhtKey,
        value: DhtValue,
        expected: Option<u64>,
    ) -> Result<u64> {
        let actual = self.version(&key);
        if actual != expected {
            return Err(DhtError::VersionConflict {
                key,
                expected,
                actual,
            });
        }
        Ok(self.put(key, value))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
