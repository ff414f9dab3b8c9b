//! Sorted-set operations
//!
//! Iteration order is always (score ascending, member lexicographic);
//! `ZREVRANGE` reverses the full order before slicing.

use crate::engine::Engine;
use crate::log::MutationRecord;
use crate::strings::clamp_range;
use brine_core::{Error, Result, SortedSet, Value, value::CHILD_OVERHEAD};

impl Engine {
    /// `ZADD`: insert or update members, returning how many were newly
    /// inserted (score updates count zero)
    pub fn zadd(&self, ns: &str, key: &[u8], pairs: Vec<(f64, Vec<u8>)>) -> Result<u64> {
        if pairs.is_empty() {
            return Err(Error::invalid_op("wrong number of arguments for 'zadd'"));
        }
        let grow: u64 = pairs
            .iter()
            .map(|(_, m)| m.len() as u64 + 8 + CHILD_OVERHEAD)
            .sum();
        let logged = pairs.clone();
        self.mutate_container(
            ns,
            key,
            "zset",
            |v| matches!(v, Value::SortedSet(_)),
            || Value::SortedSet(SortedSet::new()),
            grow,
            |entry| match &mut entry.value {
                Value::SortedSet(zs) => {
                    let mut inserted = 0u64;
                    for (score, member) in pairs {
                        if zs.insert(member, score) {
                            inserted += 1;
                        }
                    }
                    Ok(inserted)
                }
                other => Err(Error::wrong_type("zset", other.type_name())),
            },
            move |_, _| {
                Some(MutationRecord::ZAdd {
                    namespace: ns.to_string(),
                    key: key.to_vec(),
                    pairs: logged,
                })
            },
        )
    }

    /// `ZRANGE`: members (with scores) by rank, inclusive bounds with
    /// negative-from-end semantics
    pub fn zrange(
        &self,
        ns: &str,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::SortedSet(zs) => {
                let (from, to) = clamp_range(start, stop, zs.len());
                if from > to {
                    Ok(Vec::new())
                } else {
                    Ok(zs
                        .iter()
                        .skip(from)
                        .take(to - from + 1)
                        .map(|(m, s)| (m.to_vec(), s))
                        .collect())
                }
            }
            other => Err(Error::wrong_type("zset", other.type_name())),
        })?;
        Ok(got.unwrap_or_default())
    }

    /// `ZREVRANGE`: the full reverse order, then sliced
    pub fn zrevrange(
        &self,
        ns: &str,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::SortedSet(zs) => {
                let mut reversed: Vec<(Vec<u8>, f64)> =
                    zs.iter().map(|(m, s)| (m.to_vec(), s)).collect();
                reversed.reverse();
                let (from, to) = clamp_range(start, stop, reversed.len());
                if from > to {
                    Ok(Vec::new())
                } else {
                    Ok(reversed[from..=to].to_vec())
                }
            }
            other => Err(Error::wrong_type("zset", other.type_name())),
        })?;
        Ok(got.unwrap_or_default())
    }

    /// `ZRANGEBYSCORE`: inclusive on both bounds; callers pass
    /// `f64::NEG_INFINITY`/`f64::INFINITY` for the `-inf`/`+inf`
    /// sentinels
    pub fn zrangebyscore(
        &self,
        ns: &str,
        key: &[u8],
        min: f64,
        max: f64,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::SortedSet(zs) => Ok(zs
                .range_by_score(min, max)
                .into_iter()
                .map(|(m, s)| (m.to_vec(), s))
                .collect()),
            other => Err(Error::wrong_type("zset", other.type_name())),
        })?;
        Ok(got.unwrap_or_default())
    }

    /// `ZSCORE`
    pub fn zscore(&self, ns: &str, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::SortedSet(zs) => Ok(zs.score(member)),
            other => Err(Error::wrong_type("zset", other.type_name())),
        })?;
        Ok(got.flatten())
    }

    /// `ZCARD`: cardinality, 0 on a miss
    pub fn zcard(&self, ns: &str, key: &[u8]) -> Result<u64> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::SortedSet(zs) => Ok(zs.len() as u64),
            other => Err(Error::wrong_type("zset", other.type_name())),
        })?;
        Ok(got.unwrap_or(0))
    }

    /// `ZREM`: remove members, returning how many were present. An
    /// emptied sorted set disappears.
    pub fn zrem(&self, ns: &str, key: &[u8], members: &[Vec<u8>]) -> Result<u64> {
        let result = self.with_live_entry(ns, key, |entry| match &mut entry.value {
            Value::SortedSet(zs) => {
                let mut removed = 0u64;
                for m in members {
                    if zs.remove(m) {
                        removed += 1;
                    }
                }
                Ok((removed, zs.is_empty()))
            }
            other => Err(Error::wrong_type("zset", other.type_name())),
        })?;
        match result {
            Some((removed, now_empty)) => {
                if removed > 0 {
                    self.recharge_entry(ns, key);
                }
                if now_empty {
                    self.del(ns, &[key.to_vec()])?;
                }
                Ok(removed)
            }
            None => Ok(0),
        }
    }
}
