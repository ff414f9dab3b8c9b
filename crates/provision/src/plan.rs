//! The plan catalog
//!
//! A static table of tiered plans. Prices are non-negative integers in
//! the smallest unit of the external accounting system; the core never
//! does floating-point money.

use brine_core::Tier;
use once_cell::sync::Lazy;
use serde::Serialize;

/// One subscribable plan
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Stable identifier
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Tier the hosting node must match
    pub tier: Tier,
    /// Engine memory budget
    pub max_memory_mb: u64,
    /// Engine key quota
    pub max_keys: u64,
    /// Ceiling on any TTL a client may request
    pub max_ttl_seconds: u64,
    /// Price per hour, smallest accounting unit
    pub price_per_hour: u128,
    /// Price per month, smallest accounting unit
    pub price_per_month: u128,
    /// True when the plan may only run inside a TEE
    pub tee_required: bool,
    /// Marketing feature list, passed through to the catalog API
    pub features: &'static [&'static str],
}

static CATALOG: Lazy<Vec<Plan>> = Lazy::new(|| {
    vec![
        Plan {
            id: "starter",
            name: "Starter",
            tier: Tier::Standard,
            max_memory_mb: 64,
            max_keys: 10_000,
            max_ttl_seconds: 86_400,
            price_per_hour: 1_400,
            price_per_month: 990_000,
            tee_required: false,
            features: &["shared-hardware", "async-replication"],
        },
        Plan {
            id: "standard",
            name: "Standard",
            tier: Tier::Standard,
            max_memory_mb: 256,
            max_keys: 100_000,
            max_ttl_seconds: 604_800,
            price_per_hour: 5_500,
            price_per_month: 3_900_000,
            tee_required: false,
            features: &["shared-hardware", "async-replication", "pubsub"],
        },
        Plan {
            id: "premium",
            name: "Premium",
            tier: Tier::Premium,
            max_memory_mb: 1_024,
            max_keys: 1_000_000,
            max_ttl_seconds: 2_592_000,
            price_per_hour: 21_000,
            price_per_month: 14_900_000,
            tee_required: false,
            features: &[
                "dedicated-capacity",
                "sync-replication",
                "pubsub",
                "regional-routing",
            ],
        },
        Plan {
            id: "enclave",
            name: "Enclave",
            tier: Tier::Tee,
            max_memory_mb: 512,
            max_keys: 500_000,
            max_ttl_seconds: 2_592_000,
            price_per_hour: 42_000,
            price_per_month: 29_900_000,
            tee_required: true,
            features: &[
                "tee-isolation",
                "attestation",
                "sync-replication",
                "pubsub",
            ],
        },
    ]
});

/// Every plan, in catalog order
pub fn plan_catalog() -> &'static [Plan] {
    &CATALOG
}

/// Look up a plan by id
pub fn plan_by_id(id: &str) -> Option<&'static Plan> {
    CATALOG.iter().find(|p| p.id == id)
}
