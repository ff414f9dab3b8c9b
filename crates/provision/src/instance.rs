//! Tenant instance records

use brine_core::{InstanceStatus, Tier};
use brine_engine::Engine;
use serde::Serialize;
use std::sync::Arc;

/// Plan-derived limits enforced by the instance's engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstanceLimits {
    /// Engine memory budget
    pub max_memory_mb: u64,
    /// Engine key quota
    pub max_keys: u64,
    /// TTL ceiling
    pub max_ttl_seconds: u64,
}

/// A provisioned tenant engine plus its metadata
pub struct Instance {
    /// Generated id
    pub id: String,
    /// Owning tenant identity
    pub owner: String,
    /// The namespace this instance serves
    pub namespace: String,
    /// Plan it was created from
    pub plan_id: String,
    /// Tier inherited from the plan
    pub tier: Tier,
    /// Enforced limits
    pub limits: InstanceLimits,
    /// Creation time, ms since epoch
    pub created_at_ms: u64,
    /// Expiry, ms since epoch; the sweep removes expired instances
    pub expires_at_ms: u64,
    /// Lifecycle state
    pub status: InstanceStatus,
    /// Hosting node, `None` for local-only placements
    pub node_id: Option<String>,
    /// Endpoint of the hosting node
    pub endpoint: Option<String>,
    /// The engine serving this namespace
    pub engine: Arc<Engine>,
}

impl Instance {
    /// True when the instance is past its expiry
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }

    /// Owner check, case-insensitive over ASCII identifiers
    pub fn owned_by(&self, caller: &str) -> bool {
        self.owner.eq_ignore_ascii_case(caller)
    }

    /// Serializable snapshot for the control API
    pub fn info(&self) -> InstanceInfo {
        InstanceInfo {
            id: self.id.clone(),
            owner: self.owner.clone(),
            namespace: self.namespace.clone(),
            plan_id: self.plan_id.clone(),
            tier: self.tier,
            limits: self.limits,
            created_at_ms: self.created_at_ms,
            expires_at_ms: self.expires_at_ms,
            status: self.status,
            node_id: self.node_id.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

/// Engine-free instance snapshot
#[derive(Debug, Clone, Serialize)]
pub struct InstanceInfo {
    /// Generated id
    pub id: String,
    /// Owning tenant identity
    pub owner: String,
    /// Served namespace
    pub namespace: String,
    /// Plan id
    pub plan_id: String,
    /// Tier
    pub tier: Tier,
    /// Enforced limits
    pub limits: InstanceLimits,
    /// Creation time
    pub created_at_ms: u64,
    /// Expiry
    pub expires_at_ms: u64,
    /// Lifecycle state
    pub status: InstanceStatus,
    /// Placement
    pub node_id: Option<String>,
    /// Endpoint
    pub endpoint: Option<String>,
}
