//! Engine construction parameters

use std::time::Duration;

/// Eviction discipline for admissions that exceed the memory budget.
///
/// Only LRU is implemented; the remaining named policies are accepted for
/// configuration compatibility and behave as LRU. `NoEviction` refuses
/// admissions instead of evicting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Evict least-recently-used entries until the write fits
    #[default]
    Lru,
    /// Accepted alias; behaves as LRU
    Lfu,
    /// Accepted alias; behaves as LRU
    Random,
    /// Fail admissions with `MemoryLimit` instead of evicting
    NoEviction,
}

/// Construction parameters for an [`crate::Engine`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Memory budget in bytes for all namespaces combined
    pub max_memory_bytes: u64,
    /// TTL applied to `SET` when the caller gives none. `None` = no default.
    pub default_ttl: Option<Duration>,
    /// Ceiling on any requested TTL. `None` = unbounded.
    pub max_ttl: Option<Duration>,
    /// Cap on the number of keys across all namespaces. `None` = unbounded.
    pub max_keys: Option<u64>,
    /// Eviction discipline
    pub eviction_policy: EvictionPolicy,
    /// Opaque TEE provider tag carried through for attestation plumbing;
    /// the engine never interprets it
    pub tee_provider: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024,
            default_ttl: None,
            max_ttl: None,
            max_keys: None,
            eviction_policy: EvictionPolicy::Lru,
            tee_provider: None,
        }
    }
}

impl EngineConfig {
    /// Config with the given memory budget and defaults elsewhere
    pub fn with_max_memory(max_memory_bytes: u64) -> Self {
        Self {
            max_memory_bytes,
            ..Self::default()
        }
    }
}
