//! DHT entry types.

use std::time::{SystemTime, UNIX_EPOCH};

/// A 32-byte DHT key (Blake3 hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DhtKey(pub [u8; 32]);

impl DhtKey {
    /// Create a key from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl std::fmt::Display for DhtKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}...", &self.to_hex()[..8])
    }
}

/// DHT value - arbitrary bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhtValue(pub Vec<u8>);

impl DhtValue {
    /// Create from bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Try to get as UTF-8 string.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl From<Vec<u8>> for DhtValue {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&str> for DhtValue {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

/// Current unix time in milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A DHT entry with value, write timestamp and version.
#[derive(Debug, Clone)]
pub struct DhtEntry {
    /// The key.
    pub key: DhtKey,
    /// The value.
    pub value: DhtValue,
    /// Unix timestamp in milliseconds of the last write.
    pub timestamp: u64,
    /// Number of successful writes to this key, starting at 1.
    pub version: u64,
}

impl DhtEntry {
    /// Create a first-version entry with current timestamp.
    pub fn new(key: DhtKey, value: DhtValue) -> Self {
        Self {
            key,
            value,
            timestamp: now_millis(),
            version: 1,
        }
    }

    /// Replace the value as the next version of this entry.
    pub fn overwrite(&mut self, value: DhtValue) -> u64 {
        self.value = value;
        self.timestamp = now_millis().max(self.timestamp);
        self.version += 1;
        self.version
    }
}
