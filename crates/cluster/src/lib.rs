//! Cluster layer: key placement, replication, and regional routing
//!
//! - [`HashRing`]: consistent hashing with virtual nodes
//! - [`ReplicationManager`]: best-effort sync/async fan-out of mutations
//! - [`RegionalRouter`]: latency-aware replica selection
//!
//! None of this is consensus. Replication is leader-directed and
//! at-most-once by design; replicas may lag and that is the contract.

pub mod replication;
pub mod ring;
pub mod router;

pub use replication::{
    LoopbackTransport, ReplicaOp, ReplicaOpKind, ReplicationConfig, ReplicationManager,
    ReplicationMode, ReplicaTransport,
};
pub use ring::{HashRing, RingNode};
pub use router::{LatencyProbe, RegionalRouter, RouterConfig};
