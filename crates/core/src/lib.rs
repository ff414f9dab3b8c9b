//! Core types for the Brine data store
//!
//! This crate defines the vocabulary shared by every layer:
//! - [`Value`]: the tagged union of keyspace datatypes
//! - [`Error`] / [`Result`]: the unified error model
//! - [`StreamId`], [`Tier`], status enums, and clock helpers
//! - [`glob_match`]: the glob dialect used by KEYS, SCAN, and
//!   pattern subscriptions
//!
//! It has no dependency on the engine, the wire layer, or the cluster —
//! everything here is a plain data type or a pure function.

pub mod error;
pub mod glob;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use glob::glob_match;
pub use types::{now_ms, now_secs, InstanceStatus, NodeStatus, StreamId, Tier};
pub use value::{SortedSet, Stream, StreamEntry, Value};
