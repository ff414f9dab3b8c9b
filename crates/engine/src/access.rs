//! Shared access paths for the datatype modules
//!
//! Every read goes through [`Engine::with_live_entry`], which gives all
//! datatypes identical semantics for lazy expiry, hit/miss accounting,
//! and LRU promotion. Container writes share
//! [`Engine::mutate_container`], which handles admission (eviction under
//! the byte budget), creation-on-demand, and exact recharging of the
//! entry's size after the mutation.

use crate::engine::Engine;
use crate::entry::Entry;
use crate::events::EngineEvent;
use brine_core::{now_ms, Error, Result, Value};

impl Engine {
    /// Run `f` against the live entry for `key`, if one exists.
    ///
    /// Handles lazy expiry (an expired entry is removed and reported as
    /// absent), hit/miss counters, access touch, and LRU promotion.
    /// Returns `Ok(None)` on a miss; `f`'s error (typically wrong-type)
    /// passes through.
    pub(crate) fn with_live_entry<R>(
        &self,
        ns: &str,
        key: &[u8],
        f: impl FnOnce(&mut Entry) -> Result<R>,
    ) -> Result<Option<R>> {
        let now = now_ms();
        let mut events: Vec<EngineEvent> = Vec::new();
        let out = (|| {
            let mut inner = self.locked();
            if inner.expire_if_due(ns, key, now) {
                events.push(EngineEvent::KeyExpire {
                    namespace: ns.to_string(),
                    key: key.to_vec(),
                });
            }
            let exists = inner
                .namespaces
                .get(ns)
                .map_or(false, |ks| ks.entries.contains_key(key));
            let ks = inner.keyspace_mut(ns);
            ks.last_access_ms = now;
            if !exists {
                ks.misses += 1;
                inner.misses += 1;
                return Ok(None);
            }
            let entry = ks.entries.get_mut(key).expect("presence checked");
            entry.touch(now);
            let result = f(&mut *entry);
            ks.lru.touch(key);
            ks.hits += 1;
            inner.hits += 1;
            match result {
                Ok(value) => {
                    events.push(EngineEvent::KeyGet {
                        namespace: ns.to_string(),
                        key: key.to_vec(),
                    });
                    Ok(Some(value))
                }
                Err(e) => Err(e),
            }
        })();
        self.emit_all(events);
        out
    }

    /// Mutate (or create) a container entry under the admission rules.
    ///
    /// - `expected`: the variant name for wrong-type errors
    /// - `is_variant`: variant check for an existing value
    /// - `make_empty`: builds the empty container when the key is absent
    /// - `grow_estimate`: bytes this mutation may add (admission bound;
    ///   the final charge is recomputed exactly from the mutated value)
    /// - `f`: the mutation, run against the live entry
    /// - `log`: builds the append-only-log record from the result and the
    ///   mutated entry; invoked under the engine lock so records land in
    ///   apply order
    ///
    /// Lazy expiry applies first, so a mutation on an expired key starts
    /// from a fresh container.
    pub(crate) fn mutate_container<R>(
        &self,
        ns: &str,
        key: &[u8],
        expected: &'static str,
        is_variant: impl Fn(&Value) -> bool,
        make_empty: impl FnOnce() -> Value,
        grow_estimate: u64,
        f: impl FnOnce(&mut Entry) -> Result<R>,
        log: impl FnOnce(&R, &Entry) -> Option<crate::log::MutationRecord>,
    ) -> Result<R> {
        let now = now_ms();
        let mut events: Vec<EngineEvent> = Vec::new();
        let out = (|| {
            let mut inner = self.locked();
            if inner.expire_if_due(ns, key, now) {
                events.push(EngineEvent::KeyExpire {
                    namespace: ns.to_string(),
                    key: key.to_vec(),
                });
            }
            let existing = inner.namespaces.get(ns).and_then(|ks| ks.entries.get(key));
            if let Some(entry) = existing {
                if !is_variant(&entry.value) {
                    return Err(Error::wrong_type(expected, entry.value.type_name()));
                }
            }
            let is_new = existing.is_none();
            self.check_key_quota(&inner, is_new)?;

            let fresh = if is_new {
                let empty = make_empty();
                let base = Entry::charged_size(key, &empty);
                Some((empty, base))
            } else {
                None
            };
            let base = fresh.as_ref().map_or(0, |(_, b)| *b);

            if !is_new {
                // Promote before eviction so the key being written is
                // never sitting at the tail it must evict from
                inner.keyspace_mut(ns).lru.touch(key);
            }
            let mut evicted = Vec::new();
            inner.evict_until_fits(
                self.config().eviction_policy,
                self.config().max_memory_bytes,
                ns,
                key,
                (base + grow_estimate) as i64,
                &mut evicted,
            )?;
            for (namespace, victim) in evicted {
                events.push(EngineEvent::KeyEvict {
                    namespace,
                    key: victim,
                });
            }

            if let Some((empty, _)) = fresh {
                inner.insert_entry(ns, key.to_vec(), Entry::new(key, empty, now, None));
            }

            let ks = inner.keyspace_mut(ns);
            ks.last_access_ms = now;
            ks.lru.touch(key);
            let entry = ks.entries.get_mut(key).expect("present or just inserted");
            entry.last_accessed_ms = now;
            let result = f(&mut *entry);
            let delta = entry.recharge(key);
            match result {
                Ok(value) => {
                    let record = log(&value, entry);
                    inner.apply_delta(delta);
                    if let Some(rec) = record {
                        self.log_record(rec)?;
                    }
                    events.push(EngineEvent::KeySet {
                        namespace: ns.to_string(),
                        key: key.to_vec(),
                    });
                    Ok(value)
                }
                Err(e) => {
                    // A failed mutation must not leave an empty container
                    inner.apply_delta(delta);
                    if is_new {
                        inner.remove_entry(ns, key);
                    }
                    Err(e)
                }
            }
        })();
        self.emit_all(events);
        out
    }
}
