//! # BrineDB
//!
//! A multi-tenant, Redis-protocol-compatible in-memory data store with
//! per-tenant instance provisioning, best-effort replication, and an
//! append-only log for crash recovery.
//!
//! # Quick Start
//!
//! ```no_run
//! use brinedb::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> brinedb::Result<()> {
//!     let server = Server::start(ServerConfig::default()).await?;
//!     // ... serve until shutdown is requested ...
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Crate | Concern |
//! |-------|---------|
//! | `brine-core` | Value variants, errors, glob matching |
//! | `brine-engine` | Keyspace engine: TTL, LRU, pub/sub, events |
//! | `brine-wire` | RESP parser/encoder, dispatch table, listener |
//! | `brine-cluster` | Hash ring, replication, regional routing |
//! | `brine-durability` | Append-only log, replay, compaction |
//! | `brine-provision` | Plans, instances, nodes, namespace dispatch |
//!
//! The [`Server`] ties them together: one shared engine for the default
//! namespace, per-tenant engines behind the provisioning manager, a
//! RESP listener over the shared dispatch table, and background tasks
//! (expiry sweep, log flush, replication flush, provisioning sweep)
//! that all stop cleanly on [`Server::shutdown`].

mod server;

pub use server::{Server, ServerConfig};

pub use brine_cluster::{
    HashRing, LoopbackTransport, RegionalRouter, ReplicaOp, ReplicationConfig,
    ReplicationManager, ReplicationMode, RingNode, RouterConfig,
};
pub use brine_core::{Error, Result, StreamId, Tier, Value};
pub use brine_durability::{AofConfig, AofLog, FsyncPolicy};
pub use brine_engine::{
    Engine, EngineConfig, EngineEvent, EngineStats, EvictionPolicy, SetOptions,
};
pub use brine_provision::{
    plan_catalog, CreateInstance, ProvisioningConfig, ProvisioningManager, RegisterNode,
};
pub use brine_wire::{dispatch, dispatch_pipeline, ConnState, Reply, RespServerConfig};
