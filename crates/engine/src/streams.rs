//! Stream operations
//!
//! Auto-assigned ids take `max(now_ms, last_ms)` so they stay strictly
//! increasing even when the wall clock steps backwards.

use crate::engine::Engine;
use brine_core::{now_ms, Error, Result, Stream, StreamEntry, StreamId, Value};

impl Engine {
    /// `XADD`: append an entry, returning its id.
    ///
    /// With `id: None` an id is auto-assigned; an explicit id must be
    /// strictly greater than the last assigned one.
    pub fn xadd(
        &self,
        ns: &str,
        key: &[u8],
        id: Option<StreamId>,
        fields: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<StreamId> {
        if fields.is_empty() {
            return Err(Error::invalid_op("wrong number of arguments for 'xadd'"));
        }
        let grow: u64 = fields
            .iter()
            .map(|(f, v)| (f.len() + v.len() + 32) as u64)
            .sum();
        self.mutate_container(
            ns,
            key,
            "stream",
            |v| matches!(v, Value::Stream(_)),
            || Value::Stream(Stream::new()),
            grow,
            |entry| match &mut entry.value {
                Value::Stream(stream) => {
                    let assigned = match id {
                        Some(explicit) => {
                            if let Some(last) = stream.last_id() {
                                if explicit <= last {
                                    return Err(Error::invalid_op(
                                        "The ID specified in XADD is equal or smaller than the target stream top item",
                                    ));
                                }
                            }
                            explicit
                        }
                        None => {
                            let now = now_ms();
                            match stream.last_id() {
                                Some(last) if last.ms >= now => StreamId::new(last.ms, last.seq + 1),
                                _ => StreamId::new(now, 0),
                            }
                        }
                    };
                    if !stream.append(StreamEntry {
                        id: assigned,
                        fields,
                    }) {
                        return Err(Error::invalid_op(
                            "The ID specified in XADD is equal or smaller than the target stream top item",
                        ));
                    }
                    Ok(assigned)
                }
                other => Err(Error::wrong_type("stream", other.type_name())),
            },
            // Streams are not persisted to the append-only log
            |_, _| None,
        )
    }

    /// `XRANGE` with `-`/`+` expressed as [`StreamId::MIN`]/[`StreamId::MAX`]
    pub fn xrange(
        &self,
        ns: &str,
        key: &[u8],
        from: StreamId,
        to: StreamId,
        count: Option<usize>,
    ) -> Result<Vec<StreamEntry>> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Stream(stream) => Ok(stream
                .range(from, to, count)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()),
            other => Err(Error::wrong_type("stream", other.type_name())),
        })?;
        Ok(got.unwrap_or_default())
    }

    /// `XLEN`: 0 on a miss
    pub fn xlen(&self, ns: &str, key: &[u8]) -> Result<u64> {
        let got = self.with_live_entry(ns, key, |entry| match &entry.value {
            Value::Stream(stream) => Ok(stream.len() as u64),
            other => Err(Error::wrong_type("stream", other.type_name())),
        })?;
        Ok(got.unwrap_or(0))
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

    fn fields(pairs: &[(&[u8], &[u8])]) -> Vec<(Vec<u8>, Vec<u8>)> {
        pairs.iter().map(|(f, v)| (f.to_vec(), v.to_vec())).collect()
    }

    #[test]
    fn test_xadd_ids_strictly_increase() {
        let e = engine();
        let mut last = None;
        for i in 0..10u32 {
            let id = e
                .xadd(NS, b"st", None, fields(&[(b"i", &i.to_be_bytes())]))
                .unwrap();
            if let Some(prev) = last {
                assert!(id > prev, "{} must be greater than {}", id, prev);
            }
            last = Some(id);
        }
        assert_eq!(e.xlen(NS, b"st").unwrap(), 10);
    }

    #[test]
    fn test_xadd_same_millisecond_bumps_seq() {
        let e = engine();
        // Force two entries into the same millisecond bucket by pinning
        // the first id in the future.
        let future = now_ms() + 10_000;
        e.xadd(NS, b"st", Some(StreamId::new(future, 0)), fields(&[(b"a", b"1")]))
            .unwrap();
        let id = e.xadd(NS, b"st", None, fields(&[(b"a", b"2")])).unwrap();
        assert_eq!(id, StreamId::new(future, 1));
    }

    #[test]
    fn test_xadd_explicit_id_must_advance() {
        let e = engine();
        e.xadd(NS, b"st", Some(StreamId::new(100, 5)), fields(&[(b"a", b"1")]))
            .unwrap();
        assert!(e
            .xadd(NS, b"st", Some(StreamId::new(100, 5)), fields(&[(b"a", b"2")]))
            .is_err());
        assert!(e
            .xadd(NS, b"st", Some(StreamId::new(99, 9)), fields(&[(b"a", b"2")]))
            .is_err());
        e.xadd(NS, b"st", Some(StreamId::new(100, 6)), fields(&[(b"a", b"3")]))
            .unwrap();
    }

    #[test]
    fn test_xrange_sentinels_and_count() {
        let e = engine();
        for i in 0..5u64 {
            e.xadd(
                NS,
                b"st",
                Some(StreamId::new(1000 + i, 0)),
                fields(&[(b"n", &i.to_be_bytes())]),
            )
            .unwrap();
        }
        let all = e.xrange(NS, b"st", StreamId::MIN, StreamId::MAX, None).unwrap();
        assert_eq!(all.len(), 5);
        let window = e
            .xrange(
                NS,
                b"st",
                StreamId::new(1001, 0),
                StreamId::new(1003, 0),
                None,
            )
            .unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].id, StreamId::new(1001, 0));
        let capped = e
            .xrange(NS, b"st", StreamId::MIN, StreamId::MAX, Some(2))
            .unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn test_stream_ops_on_string_fail() {
        let e = engine();
        e.set(NS, b"s", b"v".to_vec(), Default::default()).unwrap();
        assert!(e.xadd(NS, b"s", None, fields(&[(b"f", b"v")])).is_err());
        assert!(e.xlen(NS, b"s").is_err());
        assert_eq!(e.xlen(NS, b"missing").unwrap(), 0);
    }
}
