//! Hash operations

use crate::engine::Engine;
use crate::log::MutationRecord;
use brine_core::{Error, Result, Value, value::CHILD_OVERHEAD};
use std::collections::HashMap;

impl Engine {
    /// `HGET`: one field, or `None` when the key or field is absent
    pub fn hget(&self, ns: &str, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Hash(map) => Ok(map.get(field).cloned()),
            other => Err(Error::wrong_type("hash", other.type_name())),
        })?;
        Ok(got.flatten())
    }

    /// `HSET`/`HMSET`: write fields, returning how many were newly created
    pub fn hset(&self, ns: &str, key: &[u8], fields: Vec<(Vec<u8>, Vec<u8>)>) -> Result<u64> {
        if fields.is_empty() {
            return Err(Error::invalid_op("wrong number of arguments for 'hset'"));
        }
        let grow: u64 = fields
            .iter()
            .map(|(f, v)| f.len() as u64 + v.len() as u64 + CHILD_OVERHEAD)
            .sum();
        let logged = fields.clone();
        self.mutate_container(
            ns,
            key,
            "hash",
            |v| matches!(v, Value::Hash(_)),
            || Value::Hash(HashMap::new()),
            grow,
            |entry| match &mut entry.value {
                Value::Hash(map) => {
                    let mut created = 0u64;
                    for (f, v) in fields {
                        if map.insert(f, v).is_none() {
                            created += 1;
                        }
                    }
                    Ok(created)
                }
                other => Err(Error::wrong_type("hash", other.type_name())),
            },
            move |_, _| {
                Some(MutationRecord::HSet {
                    namespace: ns.to_string(),
                    key: key.to_vec(),
                    fields: logged,
                })
            },
        )
    }

    /// `HMGET`: values for each requested field, misses as `None`
    pub fn hmget(&self, ns: &str, key: &[u8], fields: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Hash(map) => Ok(fields.iter().map(|f| map.get(f).cloned()).collect()),
            other => Err(Error::wrong_type("hash", other.type_name())),
        })?;
        Ok(got.unwrap_or_else(|| vec![None; fields.len()]))
    }

    /// `HGETALL`: every field/value pair
    pub fn hgetall(&self, ns: &str, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Hash(map) => Ok(map
                .iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect::<Vec<_>>()),
            other => Err(Error::wrong_type("hash", other.type_name())),
        })?;
        Ok(got.unwrap_or_default())
    }

    /// `HDEL`: remove fields, returning how many existed. Removing the
    /// last field removes the key.
    pub fn hdel(&self, ns: &str, key: &[u8], fields: &[Vec<u8>]) -> Result<u64> {
        let (removed, now_empty) = match self.with_live_entry(ns, key, |entry| {
            match &mut entry.value {
                Value::Hash(map) => {
                    let mut removed = 0u64;
                    for f in fields {
                        if map.remove(f).is_some() {
                            removed += 1;
                        }
                    }
                    Ok((removed, map.is_empty()))
                }
                other => Err(Error::wrong_type("hash", other.type_name())),
            }
        })? {
            Some(r) => r,
            None => return Ok(0),
        };
        if removed > 0 {
            self.recharge_entry(ns, key);
        }
        if now_empty {
            self.del(ns, &[key.to_vec()])?;
        }
        Ok(removed)
    }

    /// `HEXISTS`
    pub fn hexists(&self, ns: &str, key: &[u8], field: &[u8]) -> Result<bool> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Hash(map) => Ok(map.contains_key(field)),
            other => Err(Error::wrong_type("hash", other.type_name())),
        })?;
        Ok(got.unwrap_or(false))
    }

    /// `HLEN`
    pub fn hlen(&self, ns: &str, key: &[u8]) -> Result<u64> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Hash(map) => Ok(map.len() as u64),
            other => Err(Error::wrong_type("hash", other.type_name())),
        })?;
        Ok(got.unwrap_or(0))
    }

    /// `HKEYS`
    pub fn hkeys(&self, ns: &str, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Hash(map) => Ok(map.keys().cloned().collect::<Vec<_>>()),
            other => Err(Error::wrong_type("hash", other.type_name())),
        })?;
        Ok(got.unwrap_or_default())
    }

    /// `HVALS`
    pub fn hvals(&self, ns: &str, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Hash(map) => Ok(map.values().cloned().collect::<Vec<_>>()),
            other => Err(Error::wrong_type("hash", other.type_name())),
        })?;
        Ok(got.unwrap_or_default())
    }

    /// `HINCRBY`: integer arithmetic on one field, creating it at 0
    pub fn hincrby(&self, ns: &str, key: &[u8], field: &[u8], by: i64) -> Result<i64> {
        self.mutate_container(
            ns,
            key,
            "hash",
            |v| matches!(v, Value::Hash(_)),
            || Value::Hash(HashMap::new()),
            field.len() as u64 + 20 + CHILD_OVERHEAD,
            |entry| match &mut entry.value {
                Value::Hash(map) => {
                    let current: i64 = match map.get(field) {
                        Some(raw) => std::str::from_utf8(raw)
                            .ok()
                            .and_then(|s| s.parse().ok())
                            .ok_or_else(|| {
                                Error::invalid_op("hash value is not an integer")
                            })?,
                        None => 0,
                    };
                    let next = current.checked_add(by).ok_or_else(|| {
                        Error::invalid_op("increment or decrement would overflow")
                    })?;
                    map.insert(field.to_vec(), next.to_string().into_bytes());
                    Ok(next)
                }
                other => Err(Error::wrong_type("hash", other.type_name())),
            },
            |next, _| {
                Some(MutationRecord::HSet {
                    namespace: ns.to_string(),
                    key: key.to_vec(),
                    fields: vec![(field.to_vec(), next.to_string().into_bytes())],
                })
            },
        )
    }

    /// Recompute an entry's charged size after an in-place shrink
    pub(crate) fn recharge_entry(&self, ns: &str, key: &[u8]) {
        let mut inner = self.locked();
        if let Some(ks) = inner.namespaces.get_mut(ns) {
            if let Some(entry) = ks.entries.get_mut(key) {
                let delta = entry.recharge(key);
                inner.apply_delta(delta);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    const NS: &str = "default";

    fn engine() -> Engine {
        Engine::new(EngineConfig::default())
    }

    fn pair(f: &[u8], v: &[u8]) -> (Vec<u8>, Vec<u8>) {
        (f.to_vec(), v.to_vec())
    }

    #[test]
    fn test_hset_returns_created_count() {
        let e = engine();
        assert_eq!(e.hset(NS, b"h", vec![pair(b"f1", b"v1")]).unwrap(), 1);
        // Same field again: update, not a create
        assert_eq!(e.hset(NS, b"h", vec![pair(b"f1", b"v2")]).unwrap(), 0);
        assert_eq!(
            e.hset(NS, b"h", vec![pair(b"f1", b"v3"), pair(b"f2", b"v")])
                .unwrap(),
            1
        );
        assert_eq!(e.hget(NS, b"h", b"f1").unwrap(), Some(b"v3".to_vec()));
    }

    #[test]
    fn test_hget_absent() {
        let e = engine();
        assert_eq!(e.hget(NS, b"h", b"f").unwrap(), None);
        e.hset(NS, b"h", vec![pair(b"f", b"v")]).unwrap();
        assert_eq!(e.hget(NS, b"h", b"nope").unwrap(), None);
    }

    #[test]
    fn test_hmget_preserves_order_and_misses() {
        let e = engine();
        e.hset(NS, b"h", vec![pair(b"a", b"1"), pair(b"c", b"3")]).unwrap();
        let got = e
            .hmget(NS, b"h", &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
            .unwrap();
        assert_eq!(got, vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]);
        // Absent key: all None
        let got = e.hmget(NS, b"nope", &[b"a".to_vec()]).unwrap();
        assert_eq!(got, vec![None]);
    }

    #[test]
    fn test_hgetall_hkeys_hvals_hlen() {
        let e = engine();
        e.hset(NS, b"h", vec![pair(b"a", b"1"), pair(b"b", b"2")]).unwrap();
        assert_eq!(e.hlen(NS, b"h").unwrap(), 2);
        let mut all = e.hgetall(NS, b"h").unwrap();
        all.sort();
        assert_eq!(all, vec![pair(b"a", b"1"), pair(b"b", b"2")]);
        let mut keys = e.hkeys(NS, b"h").unwrap();
        keys.sort();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(e.hvals(NS, b"h").unwrap().len(), 2);
    }

    #[test]
    fn test_hdel_removes_key_when_empty() {
        let e = engine();
        e.hset(NS, b"h", vec![pair(b"a", b"1"), pair(b"b", b"2")]).unwrap();
        assert_eq!(e.hdel(NS, b"h", &[b"a".to_vec(), b"zz".to_vec()]).unwrap(), 1);
        assert!(e.hexists(NS, b"h", b"b").unwrap());
        assert_eq!(e.hdel(NS, b"h", &[b"b".to_vec()]).unwrap(), 1);
        assert_eq!(e.type_of(NS, b"h").unwrap(), None);
        assert_eq!(e.hdel(NS, b"h", &[b"a".to_vec()]).unwrap(), 0);
    }

    #[test]
    fn test_hincrby() {
        let e = engine();
        assert_eq!(e.hincrby(NS, b"h", b"n", 5).unwrap(), 5);
        assert_eq!(e.hincrby(NS, b"h", b"n", -2).unwrap(), 3);
        assert_eq!(e.hget(NS, b"h", b"n").unwrap(), Some(b"3".to_vec()));

        e.hset(NS, b"h", vec![pair(b"s", b"abc")]).unwrap();
        assert!(e.hincrby(NS, b"h", b"s", 1).is_err());
    }

    #[test]
    fn test_hash_ops_on_string_key_fail() {
        let e = engine();
        e.set(NS, b"s", b"v".to_vec(), Default::default()).unwrap();
        for err in [
            e.hget(NS, b"s", b"f").unwrap_err(),
            e.hset(NS, b"s", vec![pair(b"f", b"v")]).unwrap_err(),
            e.hlen(NS, b"s").unwrap_err(),
            e.hdel(NS, b"s", &[b"f".to_vec()]).unwrap_err(),
        ] {
            assert!(matches!(
                err,
                Error::InvalidOperation { wrong_type: true, .. }
            ));
        }
    }

    #[test]
    fn test_hdel_shrinks_accounting() {
        let e = engine();
        e.hset(NS, b"h", vec![pair(b"a", &[0u8; 100]), pair(b"b", b"x")])
            .unwrap();
        let before = e.used_bytes();
        e.hdel(NS, b"h", &[b"a".to_vec()]).unwrap();
        assert!(e.used_bytes() < before);
    }
}
