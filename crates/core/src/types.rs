//! Shared identifier and status types
//!
//! This module defines:
//! - `StreamId`: the `ms-seq` entry id for stream values
//! - `Tier`, `NodeStatus`, `InstanceStatus`: cluster/provisioning enums
//! - Clock helpers (`now_ms`, `now_secs`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current time in whole seconds since the Unix epoch
pub fn now_secs() -> u64 {
    now_ms() / 1000
}

/// Identifier of a stream entry: millisecond timestamp plus a sequence
/// number that disambiguates entries within the same millisecond.
///
/// Ids order first by `ms`, then by `seq`, and are rendered as `ms-seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId {
    /// Milliseconds since the Unix epoch
    pub ms: u64,
    /// Sequence within the millisecond
    pub seq: u64,
}

impl StreamId {
    /// The smallest possible id (`0-0`), used for the `-` range sentinel
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    /// The largest possible id, used for the `+` range sentinel
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    /// Build an id
    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// The id that immediately follows this one in stream order
    pub fn next(&self) -> StreamId {
        if self.seq == u64::MAX {
            StreamId::new(self.ms + 1, 0)
        } else {
            StreamId::new(self.ms, self.seq + 1)
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for StreamId {
    type Err = crate::Error;

    /// Parse `ms-seq`; a bare `ms` is accepted with `seq = 0`
    fn from_str(s: &str) -> crate::Result<Self> {
        let (ms_part, seq_part) = match s.split_once('-') {
            Some((m, q)) => (m, Some(q)),
            None => (s, None),
        };
        let ms: u64 = ms_part
            .parse()
            .map_err(|_| crate::Error::invalid_op(format!("invalid stream id: {}", s)))?;
        let seq: u64 = match seq_part {
            Some(q) => q
                .parse()
                .map_err(|_| crate::Error::invalid_op(format!("invalid stream id: {}", s)))?,
            None => 0,
        };
        Ok(StreamId { ms, seq })
    }
}

/// Service tier of a plan, node, or instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Shared-hardware tier
    Standard,
    /// Dedicated-capacity tier
    Premium,
    /// Trusted-execution tier; nodes carry attestation blobs
    Tee,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Standard => write!(f, "standard"),
            Tier::Premium => write!(f, "premium"),
            Tier::Tee => write!(f, "tee"),
        }
    }
}

impl FromStr for Tier {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "standard" => Ok(Tier::Standard),
            "premium" => Ok(Tier::Premium),
            "tee" => Ok(Tier::Tee),
            other => Err(crate::Error::invalid_op(format!("unknown tier: {}", other))),
        }
    }
}

/// Liveness state of a cluster node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Heartbeating and accepting placements
    Online,
    /// Missed heartbeats; skipped by the ring until it returns
    Offline,
    /// Shedding instances before removal
    Draining,
}

/// Lifecycle state of a tenant instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Being provisioned
    Creating,
    /// Serving traffic
    Running,
    /// Stopped by the owner
    Stopped,
    /// Past its expiry; about to be removed by the sweep
    Expired,
    /// Provisioning or runtime failure
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_ordering() {
        let a = StreamId::new(100, 0);
        let b = StreamId::new(100, 1);
        let c = StreamId::new(101, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(StreamId::MIN < a);
        assert!(c < StreamId::MAX);
    }

    #[test]
    fn test_stream_id_display_roundtrip() {
        let id = StreamId::new(1700000000123, 7);
        let s = id.to_string();
        assert_eq!(s, "1700000000123-7");
        let parsed: StreamId = s.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_stream_id_bare_ms_parses_with_zero_seq() {
        let parsed: StreamId = "1700000000123".parse().unwrap();
        assert_eq!(parsed, StreamId::new(1700000000123, 0));
    }

    #[test]
    fn test_stream_id_parse_rejects_garbage() {
        assert!("abc".parse::<StreamId>().is_err());
        assert!("12-xy".parse::<StreamId>().is_err());
        assert!("".parse::<StreamId>().is_err());
    }

    #[test]
    fn test_stream_id_next() {
        assert_eq!(StreamId::new(5, 3).next(), StreamId::new(5, 4));
        assert_eq!(
            StreamId::new(5, u64::MAX).next(),
            StreamId::new(6, 0)
        );
    }

    #[test]
    fn test_tier_roundtrip() {
        for tier in [Tier::Standard, Tier::Premium, Tier::Tee] {
            let s = tier.to_string();
            let parsed: Tier = s.parse().unwrap();
            assert_eq!(parsed, tier);
        }
        assert!("gold".parse::<Tier>().is_err());
    }

    #[test]
    fn test_now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        assert_eq!(now_secs(), now_ms() / 1000);
    }
}
