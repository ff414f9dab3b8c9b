//! Keyspace meta operations: TYPE, RENAME, EXISTS, DEL, KEYS, SCAN, and
//! the TTL family

use crate::engine::Engine;
use crate::events::EngineEvent;
use crate::log::MutationRecord;
use brine_core::{glob_match, now_ms, Error, Result};
use std::time::Duration;

impl Engine {
    /// `TYPE`: the variant tag, or `None` for an absent key
    pub fn type_of(&self, ns: &str, key: &[u8]) -> Result<Option<&'static str>> {
        self.with_live_entry(ns, key, |entry| Ok(entry.value.type_name()))
    }

    /// `RENAME`: move `from` over `to`, overwriting any target.
    ///
    /// The one operation that requires its key: a missing source is
    /// `KeyNotFound`.
    pub fn rename(&self, ns: &str, from: &[u8], to: &[u8]) -> Result<()> {
        let now = now_ms();
        let mut events: Vec<EngineEvent> = Vec::new();
        let out = (|| {
            let mut inner = self.locked();
            if inner.expire_if_due(ns, from, now) {
                events.push(EngineEvent::KeyExpire {
                    namespace: ns.to_string(),
                    key: from.to_vec(),
                });
            }
            let Some(mut entry) = inner.remove_entry(ns, from) else {
                return Err(Error::KeyNotFound(String::from_utf8_lossy(from).into_owned()));
            };
            // The charge covers the key bytes; recompute for the new name
            inner.remove_entry(ns, to);
            entry.recharge(to);
            inner.insert_entry(ns, to.to_vec(), entry);
            events.push(EngineEvent::KeyDelete {
                namespace: ns.to_string(),
                key: from.to_vec(),
            });
            events.push(EngineEvent::KeySet {
                namespace: ns.to_string(),
                key: to.to_vec(),
            });
            Ok(())
        })();
        self.emit_all(events);
        out
    }

    /// `EXISTS`: how many of the given keys are live
    pub fn exists(&self, ns: &str, keys: &[Vec<u8>]) -> Result<u64> {
        let now = now_ms();
        let mut events: Vec<EngineEvent> = Vec::new();
        let count = {
            let mut inner = self.locked();
            let mut count = 0u64;
            for key in keys {
                if inner.expire_if_due(ns, key, now) {
                    events.push(EngineEvent::KeyExpire {
                        namespace: ns.to_string(),
                        key: key.clone(),
                    });
                    continue;
                }
                if inner
                    .namespaces
                    .get(ns)
                    .map_or(false, |ks| ks.entries.contains_key(key.as_slice()))
                {
                    count += 1;
                }
            }
            count
        };
        self.emit_all(events);
        Ok(count)
    }

    /// `DEL`: remove keys, returning how many actually existed
    pub fn del(&self, ns: &str, keys: &[Vec<u8>]) -> Result<u64> {
        let mut events: Vec<EngineEvent> = Vec::new();
        let out = (|| {
            let mut inner = self.locked();
            let mut removed = 0u64;
            for key in keys {
                if inner.remove_entry(ns, key).is_some() {
                    removed += 1;
                    self.log_record(MutationRecord::Del {
                        namespace: ns.to_string(),
                        key: key.clone(),
                    })?;
                    events.push(EngineEvent::KeyDelete {
                        namespace: ns.to_string(),
                        key: key.clone(),
                    });
                }
            }
            Ok(removed)
        })();
        self.emit_all(events);
        out
    }

    /// `KEYS`: every live key matching the glob pattern
    pub fn keys(&self, ns: &str, pattern: &[u8]) -> Result<Vec<Vec<u8>>> {
        let now = now_ms();
        let inner = self.locked();
        let Some(ks) = inner.namespaces.get(ns) else {
            return Ok(Vec::new());
        };
        Ok(ks
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .filter(|(k, _)| glob_match(pattern, k))
            .map(|(k, _)| k.clone())
            .collect())
    }

    /// `SCAN`: cursor-driven iteration over a point-in-time key order.
    ///
    /// The cursor is an index into the sorted key list; `0` means both
    /// "start" and, in the returned position, "done". Concurrent
    /// mutation may produce duplicates or misses, never a crash.
    pub fn scan(
        &self,
        ns: &str,
        cursor: u64,
        pattern: &[u8],
        count: usize,
    ) -> Result<(u64, Vec<Vec<u8>>)> {
        let now = now_ms();
        let count = count.max(1);
        let inner = self.locked();
        let Some(ks) = inner.namespaces.get(ns) else {
            return Ok((0, Vec::new()));
        };
        let mut all: Vec<&Vec<u8>> = ks
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k)
            .collect();
        all.sort();

        let start = cursor as usize;
        if start >= all.len() {
            return Ok((0, Vec::new()));
        }
        let end = (start + count).min(all.len());
        let page = all[start..end]
            .iter()
            .filter(|k| glob_match(pattern, k))
            .map(|k| (*k).clone())
            .collect();
        let next = if end >= all.len() { 0 } else { end as u64 };
        Ok((next, page))
    }

    // =========================================================================
    // TTL
    // =========================================================================

    /// `EXPIRE`: set a relative TTL. Returns false when the key is absent.
    pub fn expire(&self, ns: &str, key: &[u8], ttl: Duration) -> Result<bool> {
        self.check_ttl(ttl)?;
        let at_ms = now_ms() + ttl.as_millis() as u64;
        self.expire_at_ms(ns, key, at_ms)
    }

    /// `EXPIREAT`: set an absolute expiry in unix seconds
    pub fn expireat(&self, ns: &str, key: &[u8], unix_secs: u64) -> Result<bool> {
        self.expire_at_ms(ns, key, unix_secs * 1000)
    }

    /// Absolute-millisecond expiry assignment shared by `EXPIRE`,
    /// `EXPIREAT`, and log replay
    pub fn expire_at_ms(&self, ns: &str, key: &[u8], at_ms: u64) -> Result<bool> {
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
            let Some(ks) = inner.namespaces.get_mut(ns) else {
                return Ok(false);
            };
            let Some(entry) = ks.entries.get_mut(key) else {
                return Ok(false);
            };
            entry.expires_at_ms = Some(at_ms);
            inner.push_expiry(ns, key, at_ms);
            self.log_record(MutationRecord::Expire {
                namespace: ns.to_string(),
                key: key.to_vec(),
                at_ms,
            })?;
            Ok(true)
        })();
        self.emit_all(events);
        out
    }

    /// `TTL`: `-2` absent, `-1` no expiry, otherwise whole seconds left
    pub fn ttl(&self, ns: &str, key: &[u8]) -> Result<i64> {
        Ok(match self.pttl(ns, key)? {
            n if n < 0 => n,
            ms => ms / 1000,
        })
    }

    /// `PTTL`: like `TTL` in milliseconds
    pub fn pttl(&self, ns: &str, key: &[u8]) -> Result<i64> {
        let now = now_ms();
        let mut events: Vec<EngineEvent> = Vec::new();
        let out = {
            let mut inner = self.locked();
            if inner.expire_if_due(ns, key, now) {
                events.push(EngineEvent::KeyExpire {
                    namespace: ns.to_string(),
                    key: key.to_vec(),
                });
            }
            match inner.namespaces.get(ns).and_then(|ks| ks.entries.get(key)) {
                None => -2,
                Some(entry) => match entry.expires_at_ms {
                    None => -1,
                    Some(at) => at.saturating_sub(now) as i64,
                },
            }
        };
        self.emit_all(events);
        Ok(out)
    }

    /// `PERSIST`: strip any expiry; returns whether one existed
    pub fn persist(&self, ns: &str, key: &[u8]) -> Result<bool> {
        let now = now_ms();
        let mut events: Vec<EngineEvent> = Vec::new();
        let out = {
            let mut inner = self.locked();
            if inner.expire_if_due(ns, key, now) {
                events.push(EngineEvent::KeyExpire {
                    namespace: ns.to_string(),
                    key: key.to_vec(),
                });
            }
            match inner
                .namespaces
                .get_mut(ns)
                .and_then(|ks| ks.entries.get_mut(key))
            {
                Some(entry) => entry.expires_at_ms.take().is_some(),
                None => false,
            }
        };
        self.emit_all(events);
        Ok(out)
    }
}
