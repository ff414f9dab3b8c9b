//! The single-instance keyspace engine
//!
//! An [`Engine`] owns a set of named namespaces, each a key→entry map with
//! an LRU recency index. On top of that it provides:
//!
//! - the datatype operations (strings, hashes, lists, sets, sorted sets,
//!   streams) with single-key atomicity
//! - TTL bookkeeping with a background sweep plus lazy expiry on access
//! - LRU eviction under a configurable memory budget
//! - synchronous pub/sub with glob patterns
//! - an event fan-out for observers and a mutation-log hook for the
//!   append-only log
//!
//! ## Locking
//!
//! All keyspace state sits behind one `parking_lot::Mutex`. Every public
//! operation takes the lock once, does its work, and releases it — which
//! makes single-key operations atomic and multi-key operations (`DEL`,
//! `EXISTS`, `MGET`, `MSET`) linearizable against each other, exactly the
//! contract the wire layer relies on. Pub/sub and the event bus carry
//! their own smaller locks and never block keyspace traffic.

pub mod config;
pub mod engine;
pub mod entry;
pub mod events;
pub mod log;
pub mod lru;
pub mod pubsub;
pub mod stats;
pub mod sweeper;
pub mod tasks;

mod access;
mod hashes;
mod keys;
mod keyspace;
mod lists;
mod sets;
mod sorted_sets;
mod streams;
mod strings;

pub use config::{EngineConfig, EvictionPolicy};
pub use engine::Engine;
pub use entry::Entry;
pub use events::{EngineEvent, EventBus};
pub use log::{MutationLog, MutationRecord};
pub use pubsub::{PubSub, PubSubMessage, SubscriberId};
pub use stats::{EngineStats, NamespaceStats};
pub use strings::SetOptions;
pub use sweeper::spawn_expiry_sweeper;
pub use tasks::TimerTask;
