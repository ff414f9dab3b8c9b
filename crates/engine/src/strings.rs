//! String operations
//!
//! `SET` and friends write whole values, so admission removes the old
//! entry's charge and admits the new one in a single delta. Counter
//! operations (`INCR`/`DECR`) and `APPEND` rewrite the stored string and
//! log a full `set` record — replay does not need to re-run arithmetic.

use crate::engine::{Engine, EngineInner};
use crate::entry::Entry;
use crate::events::EngineEvent;
use crate::log::MutationRecord;
use brine_core::{now_ms, Error, Result, Value};
use std::time::Duration;

/// Options for [`Engine::set`]
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Relative TTL; `None` falls back to the engine's default TTL
    pub ttl: Option<Duration>,
    /// Only set when the key is absent
    pub nx: bool,
    /// Only set when the key is present
    pub xx: bool,
}

impl SetOptions {
    /// Builder-style TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Builder-style NX flag
    pub fn if_absent(mut self) -> Self {
        self.nx = true;
        self
    }

    /// Builder-style XX flag
    pub fn if_present(mut self) -> Self {
        self.xx = true;
        self
    }
}

impl Engine {
    /// `GET`: the string value, or `None` on a miss
    pub fn get(&self, ns: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Str(v) => Ok(v.clone()),
            other => Err(Error::wrong_type("string", other.type_name())),
        })
    }

    /// `SET` with optional TTL and NX/XX preconditions.
    ///
    /// Returns `false` (without error) when an unmet precondition stopped
    /// the write.
    pub fn set(&self, ns: &str, key: &[u8], value: Vec<u8>, opts: SetOptions) -> Result<bool> {
        if let Some(t) = opts.ttl.or(self.config().default_ttl) {
            self.check_ttl(t)?;
        }
        let now = now_ms();
        let mut events: Vec<EngineEvent> = Vec::new();
        let out = {
            let mut inner = self.locked();
            self.set_locked(&mut inner, ns, key, value, &opts, now, &mut events)
        };
        self.emit_all(events);
        out
    }

    /// The body of `SET` under an already-held engine lock. `MSET` loops
    /// this inside one critical section so the batch stays linearizable
    /// against concurrent single-key writers.
    fn set_locked(
        &self,
        inner: &mut EngineInner,
        ns: &str,
        key: &[u8],
        value: Vec<u8>,
        opts: &SetOptions,
        now: u64,
        events: &mut Vec<EngineEvent>,
    ) -> Result<bool> {
        let ttl = opts.ttl.or(self.config().default_ttl);
        let expires_at_ms = ttl.map(|t| now + t.as_millis() as u64);

        if inner.expire_if_due(ns, key, now) {
            events.push(EngineEvent::KeyExpire {
                namespace: ns.to_string(),
                key: key.to_vec(),
            });
        }
        let existing = inner.namespaces.get(ns).and_then(|ks| ks.entries.get(key));
        let present = existing.is_some();
        if (opts.nx && present) || (opts.xx && !present) {
            return Ok(false);
        }
        self.check_key_quota(&*inner, !present)?;

        let old_size = existing.map(|e| e.size_bytes).unwrap_or(0);
        if present {
            // Writing counts as recency; also keeps the key itself
            // from sitting at the eviction tail below
            inner.keyspace_mut(ns).lru.touch(key);
        }
        let entry = Entry::new(key, Value::Str(value), now, expires_at_ms);
        let delta = entry.size_bytes as i64 - old_size as i64;

        let mut evicted = Vec::new();
        inner.evict_until_fits(
            self.config().eviction_policy,
            self.config().max_memory_bytes,
            ns,
            key,
            delta,
            &mut evicted,
        )?;
        for (namespace, victim) in evicted {
            events.push(EngineEvent::KeyEvict {
                namespace,
                key: victim,
            });
        }

        let value_for_log = match &entry.value {
            Value::Str(v) => v.clone(),
            _ => unreachable!("set writes strings"),
        };
        inner.insert_entry(ns, key.to_vec(), entry);
        if let Some(at) = expires_at_ms {
            inner.push_expiry(ns, key, at);
        }
        self.log_record(MutationRecord::Set {
            namespace: ns.to_string(),
            key: key.to_vec(),
            value: value_for_log,
            expires_at_ms,
        })?;
        events.push(EngineEvent::KeySet {
            namespace: ns.to_string(),
            key: key.to_vec(),
        });
        Ok(true)
    }

    /// `SETNX`: set only when absent; returns whether the write happened
    pub fn setnx(&self, ns: &str, key: &[u8], value: Vec<u8>) -> Result<bool> {
        self.set(ns, key, value, SetOptions::default().if_absent())
    }

    /// `SETEX`: set with a TTL in seconds
    pub fn setex(&self, ns: &str, key: &[u8], secs: u64, value: Vec<u8>) -> Result<()> {
        self.set(
            ns,
            key,
            value,
            SetOptions::default().with_ttl(Duration::from_secs(secs)),
        )?;
        Ok(())
    }

    /// `GETDEL`: read and remove in one atomic step
    pub fn getdel(&self, ns: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
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
            match inner.namespaces.get(ns).and_then(|ks| ks.entries.get(key)) {
                Some(entry) => {
                    if !matches!(entry.value, Value::Str(_)) {
                        return Err(Error::wrong_type("string", entry.value.type_name()));
                    }
                }
                None => {
                    let ks = inner.keyspace_mut(ns);
                    ks.misses += 1;
                    inner.misses += 1;
                    return Ok(None);
                }
            }
            let entry = inner.remove_entry(ns, key).expect("presence checked");
            let ks = inner.keyspace_mut(ns);
            ks.hits += 1;
            ks.last_access_ms = now;
            inner.hits += 1;
            self.log_record(MutationRecord::Del {
                namespace: ns.to_string(),
                key: key.to_vec(),
            })?;
            events.push(EngineEvent::KeyDelete {
                namespace: ns.to_string(),
                key: key.to_vec(),
            });
            match entry.value {
                Value::Str(v) => Ok(Some(v)),
                _ => unreachable!("variant checked above"),
            }
        })();
        self.emit_all(events);
        out
    }

    /// `APPEND`: concatenate onto the stored string (creating it),
    /// returning the new length
    pub fn append(&self, ns: &str, key: &[u8], suffix: &[u8]) -> Result<u64> {
        let grow = suffix.len() as u64;
        let new_value = self.mutate_container(
            ns,
            key,
            "string",
            |v| matches!(v, Value::Str(_)),
            || Value::Str(Vec::new()),
            grow,
            |entry| match &mut entry.value {
                Value::Str(v) => {
                    v.extend_from_slice(suffix);
                    Ok(v.clone())
                }
                other => Err(Error::wrong_type("string", other.type_name())),
            },
            |value, entry| {
                Some(MutationRecord::Set {
                    namespace: ns.to_string(),
                    key: key.to_vec(),
                    value: value.clone(),
                    expires_at_ms: entry.expires_at_ms,
                })
            },
        )?;
        Ok(new_value.len() as u64)
    }

    /// `STRLEN`: stored length, 0 on a miss
    pub fn strlen(&self, ns: &str, key: &[u8]) -> Result<u64> {
        let len = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Str(v) => Ok(v.len() as u64),
            other => Err(Error::wrong_type("string", other.type_name())),
        })?;
        Ok(len.unwrap_or(0))
    }

    /// `GETRANGE` with inclusive, negative-friendly bounds
    pub fn getrange(&self, ns: &str, key: &[u8], start: i64, end: i64) -> Result<Vec<u8>> {
        let slice = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Str(v) => {
                let (from, to) = clamp_range(start, end, v.len());
                if from > to || v.is_empty() {
                    Ok(Vec::new())
                } else {
                    Ok(v[from..=to].to_vec())
                }
            }
            other => Err(Error::wrong_type("string", other.type_name())),
        })?;
        Ok(slice.unwrap_or_default())
    }

    /// `INCR`/`INCRBY`: add `by` to the integer value, creating `"0"`
    /// when the key is absent
    pub fn incr_by(&self, ns: &str, key: &[u8], by: i64) -> Result<i64> {
        let new_value = self.mutate_container(
            ns,
            key,
            "string",
            |v| matches!(v, Value::Str(_)),
            || Value::Str(b"0".to_vec()),
            // A 64-bit integer rendering never exceeds 20 bytes
            20,
            |entry| match &mut entry.value {
                Value::Str(v) => {
                    let current: i64 = std::str::from_utf8(v)
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| {
                            Error::invalid_op("value is not an integer or out of range")
                        })?;
                    let next = current.checked_add(by).ok_or_else(|| {
                        Error::invalid_op("increment or decrement would overflow")
                    })?;
                    *v = next.to_string().into_bytes();
                    Ok((next, v.clone()))
                }
                other => Err(Error::wrong_type("string", other.type_name())),
            },
            |(_, bytes), entry| {
                Some(MutationRecord::Set {
                    namespace: ns.to_string(),
                    key: key.to_vec(),
                    value: bytes.clone(),
                    expires_at_ms: entry.expires_at_ms,
                })
            },
        )?;
        Ok(new_value.0)
    }

    /// `DECR`/`DECRBY`
    pub fn decr_by(&self, ns: &str, key: &[u8], by: i64) -> Result<i64> {
        self.incr_by(
            ns,
            key,
            by.checked_neg()
                .ok_or_else(|| Error::invalid_op("increment or decrement would overflow"))?,
        )
    }

    /// `MGET`: the whole batch reads inside one critical section, the
    /// same discipline as `EXISTS`/`DEL`, so it is linearizable against
    /// concurrent writers. Wrong-typed and absent keys both read as
    /// `None`.
    pub fn mget(&self, ns: &str, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        let now = now_ms();
        let mut events: Vec<EngineEvent> = Vec::new();
        let out = {
            let mut inner = self.locked();
            let mut out = Vec::with_capacity(keys.len());
            for key in keys {
                if inner.expire_if_due(ns, key, now) {
                    events.push(EngineEvent::KeyExpire {
                        namespace: ns.to_string(),
                        key: key.clone(),
                    });
                }
                let ks = inner.keyspace_mut(ns);
                ks.last_access_ms = now;
                let value = match ks.entries.get_mut(key.as_slice()) {
                    Some(entry) => {
                        entry.touch(now);
                        let value = match &entry.value {
                            Value::Str(v) => Some(v.clone()),
                            _ => None,
                        };
                        ks.lru.touch(key);
                        ks.hits += 1;
                        inner.hits += 1;
                        events.push(EngineEvent::KeyGet {
                            namespace: ns.to_string(),
                            key: key.clone(),
                        });
                        value
                    }
                    None => {
                        ks.misses += 1;
                        inner.misses += 1;
                        None
                    }
                };
                out.push(value);
            }
            out
        };
        self.emit_all(events);
        Ok(out)
    }

    /// `MSET`: every pair is applied inside one critical section, so the
    /// batch is linearizable against concurrent single-key writers
    pub fn mset(&self, ns: &str, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        if let Some(t) = self.config().default_ttl {
            self.check_ttl(t)?;
        }
        let now = now_ms();
        let opts = SetOptions::default();
        let mut events: Vec<EngineEvent> = Vec::new();
        let out = {
            let mut inner = self.locked();
            let mut result = Ok(());
            for (key, value) in pairs {
                if let Err(e) =
                    self.set_locked(&mut inner, ns, &key, value, &opts, now, &mut events)
                {
                    result = Err(e);
                    break;
                }
            }
            result
        };
        self.emit_all(events);
        out
    }
}

/// Clamp an inclusive `(start, end)` pair with negative-from-end
/// semantics onto `[0, len)`. Returns `(from, to)`; `from > to` means an
/// empty selection.
pub(crate) fn clamp_range(start: i64, end: i64, len: usize) -> (usize, usize) {
    if len == 0 {
        return (1, 0);
    }
    let n = len as i64;
    let from = if start < 0 { (n + start).max(0) } else { start.min(n - 1) };
    let to = if end < 0 { n + end } else { end.min(n - 1) };
    if from > to || to < 0 {
        (1, 0)
    } else {
        (from as usize, to as usize)
    }
}
