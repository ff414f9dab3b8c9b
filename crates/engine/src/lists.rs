//! List operations

use crate::engine::Engine;
use crate::log::MutationRecord;
use crate::strings::clamp_range;
use brine_core::{Error, Result, Value, value::CHILD_OVERHEAD};
use std::collections::VecDeque;

impl Engine {
    fn push(
        &self,
        ns: &str,
        key: &[u8],
        elems: Vec<Vec<u8>>,
        left: bool,
    ) -> Result<u64> {
        if elems.is_empty() {
            return Err(Error::invalid_op("wrong number of arguments for 'push'"));
        }
        let grow: u64 = elems
            .iter()
            .map(|e| e.len() as u64 + CHILD_OVERHEAD)
            .sum();
        let logged = elems.clone();
        self.mutate_container(
            ns,
            key,
            "list",
            |v| matches!(v, Value::List(_)),
            || Value::List(VecDeque::new()),
            grow,
            |entry| match &mut entry.value {
                Value::List(items) => {
                    for e in elems {
                        if left {
                            items.push_front(e);
                        } else {
                            items.push_back(e);
                        }
                    }
                    Ok(items.len() as u64)
                }
                other => Err(Error::wrong_type("list", other.type_name())),
            },
            move |_, _| {
                let rec = if left {
                    MutationRecord::LPush {
                        namespace: ns.to_string(),
                        key: key.to_vec(),
                        elems: logged,
                    }
                } else {
                    MutationRecord::RPush {
                        namespace: ns.to_string(),
                        key: key.to_vec(),
                        elems: logged,
                    }
                };
                Some(rec)
            },
        )
    }

    /// `LPUSH`: prepend elements (first argument ends up outermost),
    /// returning the new length
    pub fn lpush(&self, ns: &str, key: &[u8], elems: Vec<Vec<u8>>) -> Result<u64> {
        self.push(ns, key, elems, true)
    }

    /// `RPUSH`: append elements, returning the new length
    pub fn rpush(&self, ns: &str, key: &[u8], elems: Vec<Vec<u8>>) -> Result<u64> {
        self.push(ns, key, elems, false)
    }

    fn pop(&self, ns: &str, key: &[u8], left: bool) -> Result<Option<Vec<u8>>> {
        let popped = self.with_live_entry(ns, key, |entry| match &mut entry.value {
            Value::List(items) => Ok(if left {
                items.pop_front()
            } else {
                items.pop_back()
            }),
            other => Err(Error::wrong_type("list", other.type_name())),
        })?;
        let popped = popped.flatten();
        if popped.is_some() {
            self.recharge_entry(ns, key);
            if self.llen(ns, key)? == 0 {
                self.del(ns, &[key.to_vec()])?;
            }
        }
        Ok(popped)
    }

    /// `LPOP`
    pub fn lpop(&self, ns: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.pop(ns, key, true)
    }

    /// `RPOP`
    pub fn rpop(&self, ns: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.pop(ns, key, false)
    }

    /// `LLEN`: 0 on a miss
    pub fn llen(&self, ns: &str, key: &[u8]) -> Result<u64> {
        let len = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::List(items) => Ok(items.len() as u64),
            other => Err(Error::wrong_type("list", other.type_name())),
        })?;
        Ok(len.unwrap_or(0))
    }

    /// `LINDEX` with negative indices counting from the tail
    pub fn lindex(&self, ns: &str, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::List(items) => {
                let n = items.len() as i64;
                let i = if index < 0 { n + index } else { index };
                if i < 0 || i >= n {
                    Ok(None)
                } else {
                    Ok(items.get(i as usize).cloned())
                }
            }
            other => Err(Error::wrong_type("list", other.type_name())),
        })?;
        Ok(got.flatten())
    }

    /// `LSET`: replace the element at `index`; out-of-range is an error
    pub fn lset(&self, ns: &str, key: &[u8], index: i64, value: Vec<u8>) -> Result<()> {
        let updated = self.with_live_entry(ns, key, |entry| match &mut entry.value {
            Value::List(items) => {
                let n = items.len() as i64;
                let i = if index < 0 { n + index } else { index };
                if i < 0 || i >= n {
                    return Err(Error::invalid_op("index out of range"));
                }
                items[i as usize] = value;
                Ok(())
            }
            other => Err(Error::wrong_type("list", other.type_name())),
        })?;
        match updated {
            Some(()) => {
                self.recharge_entry(ns, key);
                Ok(())
            }
            None => Err(Error::invalid_op("no such key")),
        }
    }

    /// `LRANGE` with inclusive, negative-friendly bounds clamped to the
    /// list. Out-of-range selections return an empty vector.
    pub fn lrange(&self, ns: &str, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::List(items) => {
                let (from, to) = clamp_range(start, stop, items.len());
                if from > to {
                    Ok(Vec::new())
                } else {
                    Ok(items.iter().skip(from).take(to - from + 1).cloned().collect())
                }
            }
            other => Err(Error::wrong_type("list", other.type_name())),
        })?;
        Ok(got.unwrap_or_default())
    }

    /// `LTRIM`: retain only the selected slice; an empty selection
    /// removes the key
    pub fn ltrim(&self, ns: &str, key: &[u8], start: i64, stop: i64) -> Result<()> {
        let remaining = self.with_live_entry(ns, key, |entry| match &mut entry.value {
            Value::List(items) => {
                let (from, to) = clamp_range(start, stop, items.len());
                if from > to {
                    items.clear();
                } else {
                    let kept: VecDeque<Vec<u8>> = items
                        .iter()
                        .skip(from)
                        .take(to - from + 1)
                        .cloned()
                        .collect();
                    *items = kept;
                }
                Ok(items.len())
            }
            other => Err(Error::wrong_type("list", other.type_name())),
        })?;
        match remaining {
            Some(0) => {
                self.del(ns, &[key.to_vec()])?;
                Ok(())
            }
            Some(_) => {
                self.recharge_entry(ns, key);
                Ok(())
            }
            None => Ok(()),
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

    fn elems(items: &[&[u8]]) -> Vec<Vec<u8>> {
        items.iter().map(|i| i.to_vec()).collect()
    }

    #[test]
    fn test_lpush_order_and_length() {
        let e = engine();
        // LPUSH L a b c pushes one at a time: final order c, b, a
        assert_eq!(e.lpush(NS, b"L", elems(&[b"a", b"b", b"c"])).unwrap(), 3);
        assert_eq!(
            e.lrange(NS, b"L", 0, -1).unwrap(),
            elems(&[b"c", b"b", b"a"])
        );
    }

    #[test]
    fn test_rpush_appends() {
        let e = engine();
        e.lpush(NS, b"L", elems(&[b"a", b"b", b"c"])).unwrap();
        assert_eq!(e.rpush(NS, b"L", elems(&[b"d"])).unwrap(), 4);
        assert_eq!(
            e.lrange(NS, b"L", 0, -1).unwrap(),
            elems(&[b"c", b"b", b"a", b"d"])
        );
    }

    #[test]
    fn test_pops() {
        let e = engine();
        e.rpush(NS, b"L", elems(&[b"1", b"2", b"3"])).unwrap();
        assert_eq!(e.lpop(NS, b"L").unwrap(), Some(b"1".to_vec()));
        assert_eq!(e.rpop(NS, b"L").unwrap(), Some(b"3".to_vec()));
        assert_eq!(e.llen(NS, b"L").unwrap(), 1);
        assert_eq!(e.lpop(NS, b"L").unwrap(), Some(b"2".to_vec()));
        // Empty list disappears
        assert_eq!(e.type_of(NS, b"L").unwrap(), None);
        assert_eq!(e.lpop(NS, b"L").unwrap(), None);
    }

    #[test]
    fn test_lindex_negative() {
        let e = engine();
        e.rpush(NS, b"L", elems(&[b"a", b"b", b"c"])).unwrap();
        assert_eq!(e.lindex(NS, b"L", 0).unwrap(), Some(b"a".to_vec()));
        assert_eq!(e.lindex(NS, b"L", -1).unwrap(), Some(b"c".to_vec()));
        assert_eq!(e.lindex(NS, b"L", -3).unwrap(), Some(b"a".to_vec()));
        assert_eq!(e.lindex(NS, b"L", 3).unwrap(), None);
        assert_eq!(e.lindex(NS, b"L", -4).unwrap(), None);
    }

    #[test]
    fn test_lset_bounds() {
        let e = engine();
        e.rpush(NS, b"L", elems(&[b"a", b"b", b"c"])).unwrap();
        e.lset(NS, b"L", 1, b"B".to_vec()).unwrap();
        e.lset(NS, b"L", -1, b"C".to_vec()).unwrap();
        assert_eq!(
            e.lrange(NS, b"L", 0, -1).unwrap(),
            elems(&[b"a", b"B", b"C"])
        );
        assert!(e.lset(NS, b"L", 3, b"x".to_vec()).is_err());
        assert!(e.lset(NS, b"L", -4, b"x".to_vec()).is_err());
        assert!(e.lset(NS, b"missing", 0, b"x".to_vec()).is_err());
    }

    #[test]
    fn test_lrange_clamping() {
        let e = engine();
        e.rpush(NS, b"L", elems(&[b"a", b"b", b"c", b"d"])).unwrap();
        assert_eq!(e.lrange(NS, b"L", 1, 2).unwrap(), elems(&[b"b", b"c"]));
        assert_eq!(e.lrange(NS, b"L", -2, -1).unwrap(), elems(&[b"c", b"d"]));
        assert_eq!(e.lrange(NS, b"L", 0, 100).unwrap().len(), 4);
        assert_eq!(e.lrange(NS, b"L", 3, 1).unwrap(), Vec::<Vec<u8>>::new());
        assert_eq!(e.lrange(NS, b"missing", 0, -1).unwrap(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn test_ltrim() {
        let e = engine();
        e.rpush(NS, b"L", elems(&[b"a", b"b", b"c", b"d", b"e"])).unwrap();
        e.ltrim(NS, b"L", 1, 3).unwrap();
        assert_eq!(
            e.lrange(NS, b"L", 0, -1).unwrap(),
            elems(&[b"b", b"c", b"d"])
        );
        // Trimming to an empty selection removes the key
        e.ltrim(NS, b"L", 5, 10).unwrap();
        assert_eq!(e.type_of(NS, b"L").unwrap(), None);
    }

    #[test]
    fn test_list_ops_on_string_fail() {
        let e = engine();
        e.set(NS, b"s", b"v".to_vec(), Default::default()).unwrap();
        assert!(e.lpush(NS, b"s", elems(&[b"x"])).is_err());
        assert!(e.lrange(NS, b"s", 0, -1).is_err());
        assert!(e.lpop(NS, b"s").is_err());
    }
}
