//! Log replay
//!
//! Reads the log line by line and executes each record against a fresh
//! engine. Malformed lines are skipped and counted. Replay preserves
//! absolute expiry deadlines, so entries whose deadline has already
//! passed are loaded and expire immediately — idempotence up to TTL.

use crate::record::decode_line;
use brine_core::Result;
use brine_engine::{Engine, MutationRecord, SetOptions};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// What replay did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records executed
    pub applied: usize,
    /// Lines skipped as malformed or inapplicable
    pub skipped: usize,
}

/// Replay `path` into `engine`. A missing file is a fresh engine and
/// returns zeroed stats.
///
/// Call this before attaching the log as the engine's mutation sink, or
/// every replayed record would be re-appended.
pub fn replay_into(path: &Path, engine: &Engine) -> Result<ReplayStats> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no log file, starting fresh");
            return Ok(ReplayStats::default());
        }
        Err(e) => return Err(e.into()),
    };

    let mut stats = ReplayStats::default();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match decode_line(&line) {
            Ok((_, rec)) => match apply_record(engine, rec) {
                Ok(()) => stats.applied += 1,
                Err(e) => {
                    warn!(error = %e, "replayed record failed to apply, skipping");
                    stats.skipped += 1;
                }
            },
            Err(e) => {
                warn!(error = %e, "malformed log line, skipping");
                stats.skipped += 1;
            }
        }
    }
    info!(
        applied = stats.applied,
        skipped = stats.skipped,
        "log replay complete"
    );
    Ok(stats)
}

/// Execute one record against an engine
pub fn apply_record(engine: &Engine, rec: MutationRecord) -> Result<()> {
    match rec {
        MutationRecord::Set {
            namespace,
            key,
            value,
            expires_at_ms,
        } => {
            engine.set(&namespace, &key, value, SetOptions::default())?;
            if let Some(at_ms) = expires_at_ms {
                engine.expire_at_ms(&namespace, &key, at_ms)?;
            }
            Ok(())
        }
        MutationRecord::Del { namespace, key } => {
            engine.del(&namespace, &[key])?;
            Ok(())
        }
        MutationRecord::Expire {
            namespace,
            key,
            at_ms,
        } => {
            engine.expire_at_ms(&namespace, &key, at_ms)?;
            Ok(())
        }
        MutationRecord::HSet {
            namespace,
            key,
            fields,
        } => {
            engine.hset(&namespace, &key, fields)?;
            Ok(())
        }
        MutationRecord::LPush {
            namespace,
            key,
            elems,
        } => {
            engine.lpush(&namespace, &key, elems)?;
            Ok(())
        }
        MutationRecord::RPush {
            namespace,
            key,
            elems,
        } => {
            engine.rpush(&namespace, &key, elems)?;
            Ok(())
        }
        MutationRecord::SAdd {
            namespace,
            key,
            members,
        } => {
            engine.sadd(&namespace, &key, members)?;
            Ok(())
        }
        MutationRecord::ZAdd {
            namespace,
            key,
            pairs,
        } => {
            engine.zadd(&namespace, &key, pairs)?;
            Ok(())
        }
    }
}
