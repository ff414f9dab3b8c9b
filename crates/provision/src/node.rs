//! Cluster node records

use brine_core::{NodeStatus, Tier};
use serde::Serialize;

/// A registered cluster member.
///
/// Invariants maintained by the manager: `used_memory_mb <=
/// max_memory_mb`, and `instance_count` equals the number of instances
/// placed on this node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    /// Cluster-unique id
    pub id: String,
    /// Network address
    pub address: String,
    /// Service endpoint clients connect to
    pub endpoint: String,
    /// Geographic region
    pub region: String,
    /// Tier the node can host
    pub tier: Tier,
    /// Total memory available for instances
    pub max_memory_mb: u64,
    /// Memory charged by placed instances
    pub used_memory_mb: u64,
    /// Number of instances placed here
    pub instance_count: u32,
    /// Liveness state
    pub status: NodeStatus,
    /// Last heartbeat, ms since epoch
    pub last_heartbeat_ms: u64,
    /// True when the node runs inside a TEE
    pub tee: bool,
    /// Opaque attestation blob, never inspected by the core
    #[serde(skip)]
    pub attestation: Option<Vec<u8>>,
}

impl NodeRecord {
    /// Memory still available for placement
    pub fn free_memory_mb(&self) -> u64 {
        self.max_memory_mb.saturating_sub(self.used_memory_mb)
    }

    /// True when the node can host an instance of `tier` needing
    /// `memory_mb`
    pub fn fits(&self, tier: Tier, memory_mb: u64) -> bool {
        self.status == NodeStatus::Online && self.tier == tier && self.free_memory_mb() >= memory_mb
    }

    /// True when the heartbeat is older than `timeout_ms`
    pub fn is_stale(&self, now_ms: u64, timeout_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heartbeat_ms) > timeout_ms
    }
}
