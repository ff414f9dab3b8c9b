//! Append-only durability
//!
//! Every durable mutation becomes one UTF-8 line,
//! `ts|op|ns|key|b64(arg0)|…`, appended to the log file under one of
//! three fsync policies. On start the log is replayed line by line into
//! a fresh engine; malformed lines are skipped and counted. Past the
//! rewrite threshold the live keyspace is re-emitted as a minimal op
//! sequence and atomically renamed over the log.
//!
//! A missing file is a fresh engine — there is no magic or version
//! header.

pub mod aof;
pub mod compact;
pub mod record;
pub mod replay;

pub use aof::{AofConfig, AofLog, FsyncPolicy};
pub use compact::maybe_rewrite;
pub use record::{decode_line, encode_line};
pub use replay::{replay_into, ReplayStats};
