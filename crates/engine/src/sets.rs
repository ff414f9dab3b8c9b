//! Set operations
//!
//! `SPOP` and `SRANDMEMBER` choose uniformly at random; the discipline is
//! the same for both within a process.

use crate::engine::Engine;
use crate::log::MutationRecord;
use brine_core::{Error, Result, Value, value::CHILD_OVERHEAD};
use rand::seq::IteratorRandom;
use std::collections::HashSet;

impl Engine {
    /// `SADD`: add members, returning how many were new
    pub fn sadd(&self, ns: &str, key: &[u8], members: Vec<Vec<u8>>) -> Result<u64> {
        if members.is_empty() {
            return Err(Error::invalid_op("wrong number of arguments for 'sadd'"));
        }
        let grow: u64 = members
            .iter()
            .map(|m| m.len() as u64 + CHILD_OVERHEAD)
            .sum();
        let logged = members.clone();
        self.mutate_container(
            ns,
            key,
            "set",
            |v| matches!(v, Value::Set(_)),
            || Value::Set(HashSet::new()),
            grow,
            |entry| match &mut entry.value {
                Value::Set(set) => {
                    let mut added = 0u64;
                    for m in members {
                        if set.insert(m) {
                            added += 1;
                        }
                    }
                    Ok(added)
                }
                other => Err(Error::wrong_type("set", other.type_name())),
            },
            move |_, _| {
                Some(MutationRecord::SAdd {
                    namespace: ns.to_string(),
                    key: key.to_vec(),
                    members: logged,
                })
            },
        )
    }

    /// `SREM`: remove members, returning how many were present. An
    /// emptied set disappears.
    pub fn srem(&self, ns: &str, key: &[u8], members: &[Vec<u8>]) -> Result<u64> {
        let result = self.with_live_entry(ns, key, |entry| match &mut entry.value {
            Value::Set(set) => {
                let mut removed = 0u64;
                for m in members {
                    if set.remove(m) {
                        removed += 1;
                    }
                }
                Ok((removed, set.is_empty()))
            }
            other => Err(Error::wrong_type("set", other.type_name())),
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

    /// `SMEMBERS`
    pub fn smembers(&self, ns: &str, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Set(set) => Ok(set.iter().cloned().collect::<Vec<_>>()),
            other => Err(Error::wrong_type("set", other.type_name())),
        })?;
        Ok(got.unwrap_or_default())
    }

    /// `SISMEMBER`
    pub fn sismember(&self, ns: &str, key: &[u8], member: &[u8]) -> Result<bool> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Set(set) => Ok(set.contains(member)),
            other => Err(Error::wrong_type("set", other.type_name())),
        })?;
        Ok(got.unwrap_or(false))
    }

    /// `SCARD`: cardinality, 0 on a miss
    pub fn scard(&self, ns: &str, key: &[u8]) -> Result<u64> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Set(set) => Ok(set.len() as u64),
            other => Err(Error::wrong_type("set", other.type_name())),
        })?;
        Ok(got.unwrap_or(0))
    }

    /// `SPOP`: remove and return a uniformly random member
    pub fn spop(&self, ns: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let result = self.with_live_entry(ns, key, |entry| match &mut entry.value {
            Value::Set(set) => {
                let chosen = set.iter().choose(&mut rand::thread_rng()).cloned();
                if let Some(m) = &chosen {
                    set.remove(m);
                }
                Ok((chosen, set.is_empty()))
            }
            other => Err(Error::wrong_type("set", other.type_name())),
        })?;
        match result {
            Some((Some(member), now_empty)) => {
                self.recharge_entry(ns, key);
                if now_empty {
                    self.del(ns, &[key.to_vec()])?;
                }
                Ok(Some(member))
            }
            _ => Ok(None),
        }
    }

    /// `SRANDMEMBER`: a uniformly random member, without removal
    pub fn srandmember(&self, ns: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Set(set) => Ok(set.iter().choose(&mut rand::thread_rng()).cloned()),
            other => Err(Error::wrong_type("set", other.type_name())),
        })?;
        Ok(got.flatten())
    }
}
