//! A single namespace: key→entry map plus its LRU index and counters
//!
//! Invariant: the LRU index and the entry map enumerate the same keys.
//! Every insert/remove below maintains both sides together; the engine
//! never touches one without the other.

use crate::entry::Entry;
use crate::lru::LruList;
use rustc_hash::FxHashMap;

/// Per-namespace keyspace state
#[derive(Debug, Default)]
pub(crate) struct Keyspace {
    pub entries: FxHashMap<Vec<u8>, Entry>,
    pub lru: LruList,
    pub hits: u64,
    pub misses: u64,
    pub last_access_ms: u64,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry, keeping the LRU index in step.
    /// Returns the replaced entry, if any.
    pub fn insert(&mut self, key: Vec<u8>, entry: Entry) -> Option<Entry> {
        self.lru.touch(&key);
        self.entries.insert(key, entry)
    }

    /// Remove an entry and its LRU node
    pub fn remove(&mut self, key: &[u8]) -> Option<Entry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.lru.remove(key);
        }
        removed
    }

    /// Total bytes charged by live entries
    pub fn used_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size_bytes).sum()
    }

    /// Creation time of the oldest entry, if any
    pub fn oldest_created_ms(&self) -> Option<u64> {
        self.entries.values().map(|e| e.created_at_ms).min()
    }
}
