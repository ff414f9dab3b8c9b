//! Statistics snapshots
//!
//! Plain serializable structs assembled under the engine lock and handed
//! to callers — the INFO command and the HTTP collaborator both consume
//! these without touching engine internals.

use serde::Serialize;

/// Rolling statistics for one namespace
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    /// Namespace name
    pub name: String,
    /// Live keys
    pub keys: u64,
    /// Bytes charged by live entries
    pub used_bytes: u64,
    /// Read hits
    pub hits: u64,
    /// Read misses
    pub misses: u64,
    /// Age of the oldest entry in ms, if any entry exists
    pub oldest_entry_age_ms: Option<u64>,
    /// Last access, ms since epoch (0 = never)
    pub last_access_ms: u64,
}

/// Aggregate engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Live keys across all namespaces
    pub total_keys: u64,
    /// Bytes charged against the budget
    pub used_bytes: u64,
    /// Configured budget
    pub max_bytes: u64,
    /// Cumulative read hits
    pub hits: u64,
    /// Cumulative read misses
    pub misses: u64,
    /// Entries evicted under memory pressure
    pub evictions: u64,
    /// Entries removed by TTL
    pub expirations: u64,
    /// hits / (hits + misses), 0.0 when no reads yet
    pub hit_rate: f64,
    /// Mean key length in bytes (0 when empty)
    pub mean_key_bytes: u64,
    /// Mean value payload size in bytes (0 when empty)
    pub mean_value_bytes: u64,
    /// Age of the oldest live entry in ms
    pub oldest_entry_age_ms: Option<u64>,
    /// Number of namespaces holding at least one key
    pub namespace_count: u64,
    /// Engine uptime in ms
    pub uptime_ms: u64,
    /// Per-namespace rows
    pub namespaces: Vec<NamespaceStats>,
}

impl EngineStats {
    /// Format the INFO-style text report served over RESP
    pub fn render_info(&self) -> String {
        let mut out = String::new();
        out.push_str("# Server\r\n");
        out.push_str(&format!("uptime_in_seconds:{}\r\n", self.uptime_ms / 1000));
        out.push_str("\r\n# Memory\r\n");
        out.push_str(&format!("used_memory:{}\r\n", self.used_bytes));
        out.push_str(&format!("maxmemory:{}\r\n", self.max_bytes));
        out.push_str("\r\n# Stats\r\n");
        out.push_str(&format!("keyspace_hits:{}\r\n", self.hits));
        out.push_str(&format!("keyspace_misses:{}\r\n", self.misses));
        out.push_str(&format!("evicted_keys:{}\r\n", self.evictions));
        out.push_str(&format!("expired_keys:{}\r\n", self.expirations));
        out.push_str("\r\n# Keyspace\r\n");
        for ns in &self.namespaces {
            out.push_str(&format!("db_{}:keys={}\r\n", ns.name, ns.keys));
        }
        out
    }
}
