//! The engine: namespaces, admission, expiry, and observers
//!
//! Datatype operations live in sibling modules (`strings`, `hashes`, …)
//! as `impl Engine` blocks; this module owns the shared machinery they
//! build on — the locked inner state, lazy expiry, LRU eviction, the
//! expiration heap, statistics, and the pub/sub and event fan-outs.

use crate::config::{EngineConfig, EvictionPolicy};
use crate::entry::Entry;
use crate::events::{EngineEvent, EventBus};
use crate::keyspace::Keyspace;
use crate::log::{MutationLog, MutationRecord};
use crate::pubsub::{PubSub, PubSubMessage, SubscriberId};
use crate::stats::{EngineStats, NamespaceStats};
use brine_core::{now_ms, Error, Result, Value};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

/// Scheduled expiry check; stale records are skipped on pop
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ExpiryRecord {
    pub at_ms: u64,
    pub namespace: String,
    pub key: Vec<u8>,
}

pub(crate) struct EngineInner {
    pub namespaces: HashMap<String, Keyspace>,
    pub expiry: BinaryHeap<Reverse<ExpiryRecord>>,
    pub used_bytes: u64,
    pub total_keys: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl EngineInner {
    fn new() -> Self {
        Self {
            namespaces: HashMap::new(),
            expiry: BinaryHeap::new(),
            used_bytes: 0,
            total_keys: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    pub(crate) fn keyspace_mut(&mut self, ns: &str) -> &mut Keyspace {
        self.namespaces
            .entry(ns.to_string())
            .or_insert_with(Keyspace::new)
    }

    /// Remove an entry, keeping the byte and key accounting exact
    pub(crate) fn remove_entry(&mut self, ns: &str, key: &[u8]) -> Option<Entry> {
        let removed = self.namespaces.get_mut(ns)?.remove(key);
        if let Some(entry) = &removed {
            self.used_bytes = self.used_bytes.saturating_sub(entry.size_bytes);
            self.total_keys = self.total_keys.saturating_sub(1);
        }
        removed
    }

    /// Insert or replace an entry, keeping the accounting exact
    pub(crate) fn insert_entry(&mut self, ns: &str, key: Vec<u8>, entry: Entry) {
        self.used_bytes += entry.size_bytes;
        let replaced = self.keyspace_mut(ns).insert(key, entry);
        match replaced {
            Some(old) => self.used_bytes = self.used_bytes.saturating_sub(old.size_bytes),
            None => self.total_keys += 1,
        }
    }

    /// Apply a size delta after an in-place container mutation
    pub(crate) fn apply_delta(&mut self, delta: i64) {
        if delta >= 0 {
            self.used_bytes += delta as u64;
        } else {
            self.used_bytes = self.used_bytes.saturating_sub((-delta) as u64);
        }
    }

    /// Remove the entry if its TTL has elapsed. Returns true on removal.
    pub(crate) fn expire_if_due(&mut self, ns: &str, key: &[u8], now: u64) -> bool {
        let due = self
            .namespaces
            .get(ns)
            .and_then(|ks| ks.entries.get(key))
            .map(|e| e.is_expired(now))
            .unwrap_or(false);
        if due {
            self.remove_entry(ns, key);
            self.expirations += 1;
        }
        due
    }

    pub(crate) fn push_expiry(&mut self, ns: &str, key: &[u8], at_ms: u64) {
        self.expiry.push(Reverse(ExpiryRecord {
            at_ms,
            namespace: ns.to_string(),
            key: key.to_vec(),
        }));
    }

    /// Evict LRU entries until `delta` more bytes fit under `budget`.
    ///
    /// The key being written (`protect`) is never chosen. Evicted keys are
    /// appended to `evicted` so the caller can emit events after unlock.
    /// One victim is removed per iteration until the write fits.
    pub(crate) fn evict_until_fits(
        &mut self,
        policy: EvictionPolicy,
        budget: u64,
        ns: &str,
        protect: &[u8],
        delta: i64,
        evicted: &mut Vec<(String, Vec<u8>)>,
    ) -> Result<()> {
        if delta <= 0 {
            return Ok(());
        }
        let needed = delta as u64;
        if needed > budget {
            return Err(Error::MemoryLimit { needed, budget });
        }
        while self.used_bytes + needed > budget {
            if policy == EvictionPolicy::NoEviction {
                return Err(Error::MemoryLimit { needed, budget });
            }
            // Globally oldest LRU tail across namespaces
            let mut victim: Option<(String, u64)> = None;
            for (name, ks) in &self.namespaces {
                if let Some(tail) = ks.lru.lru_key() {
                    if name == ns && tail == protect {
                        continue;
                    }
                    let last = ks
                        .entries
                        .get(tail)
                        .map(|e| e.last_accessed_ms)
                        .unwrap_or(0);
                    if victim.as_ref().map_or(true, |(_, best)| last < *best) {
                        victim = Some((name.clone(), last));
                    }
                }
            }
            let Some((victim_ns, _)) = victim else {
                return Err(Error::MemoryLimit { needed, budget });
            };
            let victim_key = self
                .namespaces
                .get(&victim_ns)
                .and_then(|ks| ks.lru.lru_key())
                .map(<[u8]>::to_vec)
                .expect("victim namespace has an LRU tail");
            self.remove_entry(&victim_ns, &victim_key);
            self.evictions += 1;
            evicted.push((victim_ns, victim_key));
        }
        Ok(())
    }
}

/// The single-instance keyspace engine. See the crate docs for the
/// locking model.
pub struct Engine {
    config: EngineConfig,
    inner: Mutex<EngineInner>,
    pubsub: PubSub,
    events: EventBus,
    log: RwLock<Option<Arc<dyn MutationLog>>>,
    started_at_ms: u64,
}

impl Engine {
    /// Build an engine from its construction parameters
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(EngineInner::new()),
            pubsub: PubSub::new(),
            events: EventBus::new(),
            log: RwLock::new(None),
            started_at_ms: now_ms(),
        }
    }

    /// The construction parameters
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The observer event bus
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Attach the append-only log sink. Replayed state should be loaded
    /// before attaching, or replay would be re-logged.
    pub fn set_mutation_log(&self, log: Arc<dyn MutationLog>) {
        *self.log.write() = Some(log);
    }

    /// Detach the log sink
    pub fn clear_mutation_log(&self) {
        *self.log.write() = None;
    }

    pub(crate) fn locked(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock()
    }

    /// Write `rec` to the attached log, if any. Called with the engine
    /// lock held so records land in apply order.
    pub(crate) fn log_record(&self, rec: MutationRecord) -> Result<()> {
        let guard = self.log.read();
        match guard.as_ref() {
            Some(log) => log.record(rec),
            None => Ok(()),
        }
    }

    pub(crate) fn emit_all(&self, events: Vec<EngineEvent>) {
        for event in events {
            self.events.emit(event);
        }
    }

    /// Enforce the key-count quota before admitting a brand-new key
    pub(crate) fn check_key_quota(&self, inner: &EngineInner, is_new: bool) -> Result<()> {
        if !is_new {
            return Ok(());
        }
        if let Some(max) = self.config.max_keys {
            if inner.total_keys >= max {
                return Err(Error::QuotaExceeded {
                    resource: "keys",
                    limit: max,
                    requested: inner.total_keys + 1,
                });
            }
        }
        Ok(())
    }

    /// Validate a requested TTL against the configured ceiling
    pub(crate) fn check_ttl(&self, ttl: std::time::Duration) -> Result<()> {
        if let Some(max) = self.config.max_ttl {
            if ttl > max {
                return Err(Error::TtlExceeded {
                    requested_secs: ttl.as_secs(),
                    max_secs: max.as_secs(),
                });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Expiration sweep
    // =========================================================================

    /// Remove every entry whose expiry has passed. Returns the count.
    ///
    /// Runs from the 1 s sweeper; lazy expiry on access covers the gaps.
    /// Heap records are advisory — an entry that was deleted or had its
    /// TTL replaced since scheduling is skipped.
    pub fn sweep_expired(&self) -> usize {
        let now = now_ms();
        let mut expired: Vec<(String, Vec<u8>)> = Vec::new();
        {
            let mut inner = self.locked();
            loop {
                let due = matches!(inner.expiry.peek(), Some(Reverse(head)) if head.at_ms <= now);
                if !due {
                    break;
                }
                let Reverse(rec) = inner.expiry.pop().expect("peeked entry exists");
                let still_due = inner
                    .namespaces
                    .get(&rec.namespace)
                    .and_then(|ks| ks.entries.get(&rec.key))
                    .map(|e| e.expires_at_ms == Some(rec.at_ms) && e.is_expired(now))
                    .unwrap_or(false);
                if still_due {
                    inner.remove_entry(&rec.namespace, &rec.key);
                    inner.expirations += 1;
                    expired.push((rec.namespace, rec.key));
                }
            }
        }
        let count = expired.len();
        if count > 0 {
            debug!(count, "expiration sweep removed entries");
        }
        for (namespace, key) in expired {
            self.events.emit(EngineEvent::KeyExpire { namespace, key });
        }
        count
    }

    // =========================================================================
    // Pub/sub (with event emission)
    // =========================================================================

    /// Register a pub/sub subscriber
    pub fn register_subscriber(&self) -> (SubscriberId, UnboundedReceiver<PubSubMessage>) {
        self.pubsub.register()
    }

    /// Bind a subscriber to an exact channel
    pub fn subscribe_channel(&self, id: SubscriberId, channel: &str) -> usize {
        let n = self.pubsub.subscribe(id, channel);
        self.events.emit(EngineEvent::PubSubSubscribe {
            channel: channel.to_string(),
        });
        n
    }

    /// Bind a subscriber to a glob pattern
    pub fn subscribe_pattern(&self, id: SubscriberId, pattern: &str) -> usize {
        let n = self.pubsub.psubscribe(id, pattern);
        self.events.emit(EngineEvent::PubSubSubscribe {
            channel: pattern.to_string(),
        });
        n
    }

    /// Drop an exact-channel binding
    pub fn unsubscribe_channel(&self, id: SubscriberId, channel: &str) -> usize {
        let n = self.pubsub.unsubscribe(id, channel);
        self.events.emit(EngineEvent::PubSubUnsubscribe {
            channel: channel.to_string(),
        });
        n
    }

    /// Drop a pattern binding
    pub fn unsubscribe_pattern(&self, id: SubscriberId, pattern: &str) -> usize {
        let n = self.pubsub.punsubscribe(id, pattern);
        self.events.emit(EngineEvent::PubSubUnsubscribe {
            channel: pattern.to_string(),
        });
        n
    }

    /// Remove a subscriber and all its bindings (connection teardown)
    pub fn remove_subscriber(&self, id: SubscriberId) {
        self.pubsub.remove_subscriber(id);
    }

    /// Publish to a channel; returns the number of deliveries
    pub fn publish(&self, channel: &str, payload: &[u8], publisher_id: Option<&str>) -> usize {
        let receivers = self.pubsub.publish(channel, payload, publisher_id);
        self.events.emit(EngineEvent::PubSubPublish {
            channel: channel.to_string(),
            receivers,
        });
        receivers
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Snapshot aggregate and per-namespace statistics
    pub fn stats(&self) -> EngineStats {
        let now = now_ms();
        let inner = self.locked();

        let mut key_bytes = 0u64;
        let mut value_bytes = 0u64;
        let mut oldest_created: Option<u64> = None;
        let mut namespaces = Vec::with_capacity(inner.namespaces.len());

        for (name, ks) in &inner.namespaces {
            for (key, entry) in &ks.entries {
                key_bytes += key.len() as u64;
                value_bytes += entry.value.size_bytes();
                oldest_created = Some(match oldest_created {
                    Some(o) => o.min(entry.created_at_ms),
                    None => entry.created_at_ms,
                });
            }
            namespaces.push(NamespaceStats {
                name: name.clone(),
                keys: ks.entries.len() as u64,
                used_bytes: ks.used_bytes(),
                hits: ks.hits,
                misses: ks.misses,
                oldest_entry_age_ms: ks.oldest_created_ms().map(|c| now.saturating_sub(c)),
                last_access_ms: ks.last_access_ms,
            });
        }
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));

        let reads = inner.hits + inner.misses;
        EngineStats {
            total_keys: inner.total_keys,
            used_bytes: inner.used_bytes,
            max_bytes: self.config.max_memory_bytes,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            hit_rate: if reads == 0 {
                0.0
            } else {
                inner.hits as f64 / reads as f64
            },
            mean_key_bytes: if inner.total_keys == 0 {
                0
            } else {
                key_bytes / inner.total_keys
            },
            mean_value_bytes: if inner.total_keys == 0 {
                0
            } else {
                value_bytes / inner.total_keys
            },
            oldest_entry_age_ms: oldest_created.map(|c| now.saturating_sub(c)),
            namespace_count: inner
                .namespaces
                .values()
                .filter(|ks| !ks.entries.is_empty())
                .count() as u64,
            uptime_ms: now.saturating_sub(self.started_at_ms),
            namespaces,
        }
    }

    /// Bytes currently charged against the budget
    pub fn used_bytes(&self) -> u64 {
        self.locked().used_bytes
    }

    /// Live key count across namespaces
    pub fn key_count(&self) -> u64 {
        self.locked().total_keys
    }

    // =========================================================================
    // Compaction support
    // =========================================================================

    /// Emit the live keyspace as a minimal replayable op sequence:
    /// one reconstructing record per key, plus an `Expire` when a TTL is
    /// set. Streams are skipped — they are not persisted.
    pub fn dump_ops(&self) -> Vec<MutationRecord> {
        let now = now_ms();
        let inner = self.locked();
        let mut ops = Vec::new();
        for (ns, ks) in &inner.namespaces {
            for (key, entry) in &ks.entries {
                if entry.is_expired(now) {
                    continue;
                }
                let rec = match &entry.value {
                    Value::Str(v) => Some(MutationRecord::Set {
                        namespace: ns.clone(),
                        key: key.clone(),
                        value: v.clone(),
                        expires_at_ms: entry.expires_at_ms,
                    }),
                    Value::Hash(map) => Some(MutationRecord::HSet {
                        namespace: ns.clone(),
                        key: key.clone(),
                        fields: map.iter().map(|(f, v)| (f.clone(), v.clone())).collect(),
                    }),
                    Value::List(items) => Some(MutationRecord::RPush {
                        namespace: ns.clone(),
                        key: key.clone(),
                        elems: items.iter().cloned().collect(),
                    }),
                    Value::Set(members) => Some(MutationRecord::SAdd {
                        namespace: ns.clone(),
                        key: key.clone(),
                        members: members.iter().cloned().collect(),
                    }),
                    Value::SortedSet(zs) => Some(MutationRecord::ZAdd {
                        namespace: ns.clone(),
                        key: key.clone(),
                        pairs: zs.iter().map(|(m, s)| (s, m.to_vec())).collect(),
                    }),
                    Value::Stream(_) => None,
                };
                if let Some(rec) = rec {
                    let with_ttl = !matches!(rec, MutationRecord::Set { .. });
                    ops.push(rec);
                    if with_ttl {
                        if let Some(at_ms) = entry.expires_at_ms {
                            ops.push(MutationRecord::Expire {
                                namespace: ns.clone(),
                                key: key.clone(),
                                at_ms,
                            });
                        }
                    }
                }
            }
        }
        ops
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.locked();
        f.debug_struct("Engine")
            .field("namespaces", &inner.namespaces.len())
            .field("total_keys", &inner.total_keys)
            .field("used_bytes", &inner.used_bytes)
            .field("max_bytes", &self.config.max_memory_bytes)
            .finish()
    }
}
