//! Mutation-log hook
//!
//! The engine reports each durable mutation through this trait; the
//! append-only log in `brine-durability` implements it. The engine never
//! knows about files or fsync policies — it hands over a typed record and
//! moves on. A `record` error is propagated to the originating write (the
//! `always` fsync policy surfaces failures this way; the other policies
//! swallow them internally and count).

use brine_core::Result;

/// One replayable mutation, as written to the append-only log.
///
/// Only the operations the log persists are represented; reads, pops,
/// trims, and stream appends are deliberately absent.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRecord {
    /// Full string write (also emitted by INCR/APPEND-style rewrites)
    Set {
        namespace: String,
        key: Vec<u8>,
        value: Vec<u8>,
        /// Absolute expiry so replay after downtime keeps the deadline
        expires_at_ms: Option<u64>,
    },
    /// Key removal
    Del { namespace: String, key: Vec<u8> },
    /// TTL (re)assignment as an absolute deadline
    Expire {
        namespace: String,
        key: Vec<u8>,
        at_ms: u64,
    },
    /// Hash field writes (one pair per `HSET`, the full map on compaction)
    HSet {
        namespace: String,
        key: Vec<u8>,
        fields: Vec<(Vec<u8>, Vec<u8>)>,
    },
    /// Left push of one or more elements
    LPush {
        namespace: String,
        key: Vec<u8>,
        elems: Vec<Vec<u8>>,
    },
    /// Right push of one or more elements
    RPush {
        namespace: String,
        key: Vec<u8>,
        elems: Vec<Vec<u8>>,
    },
    /// Set member additions
    SAdd {
        namespace: String,
        key: Vec<u8>,
        members: Vec<Vec<u8>>,
    },
    /// Sorted-set insertions/updates
    ZAdd {
        namespace: String,
        key: Vec<u8>,
        pairs: Vec<(f64, Vec<u8>)>,
    },
}

impl MutationRecord {
    /// The operation tag used in the log line format
    pub fn op_name(&self) -> &'static str {
        match self {
            MutationRecord::Set { .. } => "set",
            MutationRecord::Del { .. } => "del",
            MutationRecord::Expire { .. } => "expire",
            MutationRecord::HSet { .. } => "hset",
            MutationRecord::LPush { .. } => "lpush",
            MutationRecord::RPush { .. } => "rpush",
            MutationRecord::SAdd { .. } => "sadd",
            MutationRecord::ZAdd { .. } => "zadd",
        }
    }

    /// The namespace this record applies to
    pub fn namespace(&self) -> &str {
        match self {
            MutationRecord::Set { namespace, .. }
            | MutationRecord::Del { namespace, .. }
            | MutationRecord::Expire { namespace, .. }
            | MutationRecord::HSet { namespace, .. }
            | MutationRecord::LPush { namespace, .. }
            | MutationRecord::RPush { namespace, .. }
            | MutationRecord::SAdd { namespace, .. }
            | MutationRecord::ZAdd { namespace, .. } => namespace,
        }
    }

    /// The key this record applies to
    pub fn key(&self) -> &[u8] {
        match self {
            MutationRecord::Set { key, .. }
            | MutationRecord::Del { key, .. }
            | MutationRecord::Expire { key, .. }
            | MutationRecord::HSet { key, .. }
            | MutationRecord::LPush { key, .. }
            | MutationRecord::RPush { key, .. }
            | MutationRecord::SAdd { key, .. }
            | MutationRecord::ZAdd { key, .. } => key,
        }
    }
}

/// Sink for durable mutations
pub trait MutationLog: Send + Sync {
    /// Persist one record. Errors propagate to the originating write.
    fn record(&self, rec: MutationRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_names_match_log_format() {
        let rec = MutationRecord::Set {
            namespace: "ns".into(),
            key: b"k".to_vec(),
            value: b"v".to_vec(),
            expires_at_ms: None,
        };
        assert_eq!(rec.op_name(), "set");
        assert_eq!(rec.namespace(), "ns");
        assert_eq!(rec.key(), b"k");

        let rec = MutationRecord::ZAdd {
            namespace: "ns".into(),
            key: b"z".to_vec(),
            pairs: vec![(1.5, b"m".to_vec())],
        };
        assert_eq!(rec.op_name(), "zadd");
    }
}
