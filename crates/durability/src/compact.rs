//! Compaction trigger
//!
//! When the log grows past its threshold, the live keyspace is dumped as
//! a minimal op sequence (one reconstructing record per key, plus an
//! expiry record where a TTL is set) and rewritten over the log. The
//! engine is locked only for the dump; concurrent appends are buffered
//! by the writer and carried across the swap.

use crate::aof::AofLog;
use brine_core::Result;
use brine_engine::Engine;
use tracing::debug;

/// Rewrite the log from `engine`'s live keyspace if it has outgrown the
/// threshold. Returns whether a rewrite ran.
pub fn maybe_rewrite(log: &AofLog, engine: &Engine) -> Result<bool> {
    if !log.needs_rewrite() {
        return Ok(false);
    }
    let ops = engine.dump_ops();
    debug!(ops = ops.len(), "compacting append-only log");
    log.rewrite_with(&ops)?;
    Ok(true)
}
