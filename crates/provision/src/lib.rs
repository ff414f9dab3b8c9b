//! Provisioning: plans, tenant instances, and node bookkeeping
//!
//! A [`ProvisioningManager`] owns the namespace→engine dispatch map, the
//! instance table, and the node table. The default namespace is served
//! by a process-wide shared engine whose limits are independent of any
//! plan; tenant namespaces get their own engine sized by their plan.
//!
//! Billing and attestation stay outside: the manager consumes a boolean
//! [`BillingProbe`] and carries attestation blobs opaquely.

pub mod instance;
pub mod manager;
pub mod node;
pub mod plan;

pub use instance::{Instance, InstanceInfo, InstanceLimits};
pub use manager::{
    AlwaysActive, BillingProbe, CreateInstance, ProvisioningConfig, ProvisioningManager,
    RegisterNode,
};
pub use node::NodeRecord;
pub use plan::{plan_by_id, plan_catalog, Plan};
