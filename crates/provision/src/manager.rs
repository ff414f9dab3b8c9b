//! The provisioning manager
//!
//! Owns instance lifecycle, node bookkeeping, and the namespace→engine
//! dispatch map. A 60 s sweep expires instances past their deadline and
//! marks nodes offline after 120 s of heartbeat silence.
//!
//! Placement packs densely: among the online nodes of the right tier
//! with enough free memory, the one with the **least** remaining free
//! memory wins. When no node fits, the instance is created local-only
//! with a warning — acceptable in single-node deployments.

use crate::instance::{Instance, InstanceInfo, InstanceLimits};
use crate::node::NodeRecord;
use crate::plan::plan_by_id;
use brine_cluster::{HashRing, RingNode};
use brine_core::{now_ms, Error, InstanceStatus, NodeStatus, Result, Tier};
use brine_engine::{Engine, EngineConfig, EngineEvent, EventBus, TimerTask};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Lazily queried billing predicate; issuance and verification live in
/// the external billing service.
pub trait BillingProbe: Send + Sync {
    /// True when the instance's subscription is paid up
    fn billing_active(&self, instance_id: &str) -> bool;
}

/// The default probe: everything is active (billing absent)
pub struct AlwaysActive;

impl BillingProbe for AlwaysActive {
    fn billing_active(&self, _instance_id: &str) -> bool {
        true
    }
}

/// Manager configuration
#[derive(Debug, Clone)]
pub struct ProvisioningConfig {
    /// Instance lifetime when the caller gives none
    pub default_duration_hours: u64,
    /// Heartbeat silence that flips a node offline
    pub heartbeat_timeout: Duration,
    /// Sweep period
    pub sweep_interval: Duration,
    /// Limits for the shared default-namespace engine (independent of
    /// any plan)
    pub shared_engine: EngineConfig,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            default_duration_hours: 720,
            heartbeat_timeout: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(60),
            shared_engine: EngineConfig::default(),
        }
    }
}

/// Instance creation request
#[derive(Debug, Clone)]
pub struct CreateInstance {
    /// Owning tenant identity
    pub owner: String,
    /// Plan to provision from
    pub plan_id: String,
    /// Namespace; generated when absent
    pub namespace: Option<String>,
    /// Lifetime in hours; config default when absent
    pub duration_hours: Option<u64>,
}

/// Node registration request
#[derive(Debug, Clone)]
pub struct RegisterNode {
    /// Cluster-unique id
    pub node_id: String,
    /// Network address
    pub address: String,
    /// Client-facing endpoint
    pub endpoint: String,
    /// Region tag
    pub region: String,
    /// Hosting tier
    pub tier: Tier,
    /// Capacity in MB
    pub max_memory_mb: u64,
    /// TEE flag
    pub tee: bool,
    /// Opaque attestation blob
    pub attestation: Option<Vec<u8>>,
}

/// The manager. Share behind an `Arc`.
pub struct ProvisioningManager {
    config: ProvisioningConfig,
    instances: RwLock<HashMap<String, Instance>>,
    nodes: RwLock<HashMap<String, NodeRecord>>,
    engines: DashMap<String, Arc<Engine>>,
    shared: Arc<Engine>,
    ring: Option<Arc<RwLock<HashRing>>>,
    billing: Arc<dyn BillingProbe>,
    events: EventBus,
}

impl ProvisioningManager {
    /// Build a manager with the default billing probe and no ring
    pub fn new(config: ProvisioningConfig) -> Self {
        let shared = Arc::new(Engine::new(config.shared_engine.clone()));
        Self {
            config,
            instances: RwLock::new(HashMap::new()),
            nodes: RwLock::new(HashMap::new()),
            engines: DashMap::new(),
            shared,
            ring: None,
            billing: Arc::new(AlwaysActive),
            events: EventBus::new(),
        }
    }

    /// Attach the cluster ring; registrations and liveness flips are
    /// mirrored into it
    pub fn with_ring(mut self, ring: Arc<RwLock<HashRing>>) -> Self {
        self.ring = Some(ring);
        self
    }

    /// Attach a billing probe
    pub fn with_billing(mut self, billing: Arc<dyn BillingProbe>) -> Self {
        self.billing = billing;
        self
    }

    /// The lifecycle event bus (INSTANCE_*/NODE_*/ATTESTATION_REFRESH)
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The process-wide shared engine
    pub fn shared_engine(&self) -> Arc<Engine> {
        Arc::clone(&self.shared)
    }

    /// The engine serving `namespace`: the instance's own engine when a
    /// mapping exists, the shared engine otherwise.
    pub fn engine_for_namespace(&self, namespace: &str) -> Arc<Engine> {
        match self.engines.get(namespace) {
            Some(engine) => Arc::clone(&engine),
            None => Arc::clone(&self.shared),
        }
    }

    /// Refuse instance-scoped mutations when billing lapsed. The HTTP
    /// collaborator calls this before forwarding cache writes; the
    /// default probe never refuses.
    pub fn assert_billing_active(&self, namespace: &str) -> Result<()> {
        let instances = self.instances.read();
        let Some(instance) = instances.values().find(|i| i.namespace == namespace) else {
            return Ok(()); // shared namespace, not billed
        };
        if self.billing.billing_active(&instance.id) {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!(
                "billing inactive for instance {}",
                instance.id
            )))
        }
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Provision a tenant engine
    pub fn create_instance(&self, req: CreateInstance) -> Result<InstanceInfo> {
        let plan = plan_by_id(&req.plan_id)
            .ok_or_else(|| Error::invalid_op(format!("unknown plan '{}'", req.plan_id)))?;
        let namespace = req
            .namespace
            .unwrap_or_else(|| format!("ns-{}", &Uuid::new_v4().simple().to_string()[..12]));
        if self.engines.contains_key(&namespace) {
            return Err(Error::invalid_op(format!(
                "namespace '{}' already has an instance",
                namespace
            )));
        }

        // Densest fit: the node that fits with the least slack
        let placement = {
            let mut nodes = self.nodes.write();
            let chosen = nodes
                .values_mut()
                .filter(|n| n.fits(plan.tier, plan.max_memory_mb))
                .min_by_key(|n| n.free_memory_mb())
                .map(|n| {
                    n.used_memory_mb += plan.max_memory_mb;
                    n.instance_count += 1;
                    (n.id.clone(), n.endpoint.clone())
                });
            chosen
        };
        if placement.is_none() {
            warn!(
                namespace = %namespace,
                plan = plan.id,
                "no node fits; creating local-only instance"
            );
        }

        let engine = Arc::new(Engine::new(EngineConfig {
            max_memory_bytes: plan.max_memory_mb * 1024 * 1024,
            default_ttl: None,
            max_ttl: Some(Duration::from_secs(plan.max_ttl_seconds)),
            max_keys: Some(plan.max_keys),
            eviction_policy: Default::default(),
            tee_provider: plan.tee_required.then(|| "tee".to_string()),
        }));

        let now = now_ms();
        let duration_hours = req
            .duration_hours
            .unwrap_or(self.config.default_duration_hours);
        let instance = Instance {
            id: format!("inst_{}", &Uuid::new_v4().simple().to_string()[..16]),
            owner: req.owner,
            namespace: namespace.clone(),
            plan_id: plan.id.to_string(),
            tier: plan.tier,
            limits: InstanceLimits {
                max_memory_mb: plan.max_memory_mb,
                max_keys: plan.max_keys,
                max_ttl_seconds: plan.max_ttl_seconds,
            },
            created_at_ms: now,
            expires_at_ms: now + duration_hours * 3_600_000,
            status: InstanceStatus::Running,
            node_id: placement.as_ref().map(|(id, _)| id.clone()),
            endpoint: placement.map(|(_, ep)| ep),
            engine: Arc::clone(&engine),
        };
        let info = instance.info();

        self.engines.insert(namespace.clone(), engine);
        self.instances
            .write()
            .insert(instance.id.clone(), instance);

        let expires = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(
            info.expires_at_ms as i64,
        )
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
        info!(
            instance = %info.id,
            namespace = %namespace,
            plan = %info.plan_id,
            expires_at = %expires,
            "instance created"
        );
        self.events.emit(EngineEvent::InstanceCreate {
            instance_id: info.id.clone(),
            namespace,
        });
        Ok(info)
    }

    /// Delete an instance. The caller must be its owner
    /// (case-insensitive identity match).
    pub fn delete_instance(&self, caller: &str, instance_id: &str) -> Result<()> {
        let mut instances = self.instances.write();
        let Some(instance) = instances.get(instance_id) else {
            return Err(Error::InstanceNotFound(instance_id.to_string()));
        };
        if !instance.owned_by(caller) {
            return Err(Error::Unauthorized(format!(
                "caller does not own instance {}",
                instance_id
            )));
        }
        let instance = instances.remove(instance_id).expect("presence checked");
        drop(instances);

        self.engines.remove(&instance.namespace);
        if let Some(node_id) = &instance.node_id {
            let mut nodes = self.nodes.write();
            if let Some(node) = nodes.get_mut(node_id) {
                node.used_memory_mb = node
                    .used_memory_mb
                    .saturating_sub(instance.limits.max_memory_mb);
                node.instance_count = node.instance_count.saturating_sub(1);
            }
        }

        info!(instance = %instance.id, namespace = %instance.namespace, "instance deleted");
        self.events.emit(EngineEvent::InstanceDelete {
            instance_id: instance.id.clone(),
            namespace: instance.namespace.clone(),
        });
        Ok(())
    }

    /// Snapshot one instance
    pub fn get_instance(&self, instance_id: &str) -> Result<InstanceInfo> {
        self.instances
            .read()
            .get(instance_id)
            .map(Instance::info)
            .ok_or_else(|| Error::InstanceNotFound(instance_id.to_string()))
    }

    /// Snapshot all instances, optionally filtered by owner
    pub fn list_instances(&self, owner: Option<&str>) -> Vec<InstanceInfo> {
        self.instances
            .read()
            .values()
            .filter(|i| owner.map_or(true, |o| i.owned_by(o)))
            .map(Instance::info)
            .collect()
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Register a node, replacing any previous registration under the
    /// same id
    pub fn register_node(&self, req: RegisterNode) {
        let now = now_ms();
        let record = NodeRecord {
            id: req.node_id.clone(),
            address: req.address,
            endpoint: req.endpoint.clone(),
            region: req.region.clone(),
            tier: req.tier,
            max_memory_mb: req.max_memory_mb,
            used_memory_mb: 0,
            instance_count: 0,
            status: NodeStatus::Online,
            last_heartbeat_ms: now,
            tee: req.tee,
            attestation: req.attestation,
        };
        self.nodes.write().insert(req.node_id.clone(), record);

        if let Some(ring) = &self.ring {
            ring.write().add_node(RingNode {
                id: req.node_id.clone(),
                endpoint: req.endpoint,
                region: req.region,
                tier: req.tier,
                online: true,
            });
        }
        info!(node = %req.node_id, "node registered");
        self.events.emit(EngineEvent::NodeJoin {
            node_id: req.node_id,
        });
    }

    /// Record a heartbeat; optionally refresh the attestation blob
    pub fn heartbeat(&self, node_id: &str, attestation: Option<Vec<u8>>) -> Result<()> {
        let mut nodes = self.nodes.write();
        let Some(node) = nodes.get_mut(node_id) else {
            return Err(Error::NodeUnavailable(node_id.to_string()));
        };
        node.last_heartbeat_ms = now_ms();
        let was_offline = node.status == NodeStatus::Offline;
        node.status = NodeStatus::Online;
        let refreshed = if let Some(blob) = attestation {
            node.attestation = Some(blob);
            true
        } else {
            false
        };
        drop(nodes);

        if was_offline {
            if let Some(ring) = &self.ring {
                ring.write().set_online(node_id, true);
            }
        }
        if refreshed {
            self.events.emit(EngineEvent::AttestationRefresh {
                node_id: node_id.to_string(),
            });
        }
        Ok(())
    }

    /// Snapshot all nodes
    pub fn list_nodes(&self) -> Vec<NodeRecord> {
        self.nodes.read().values().cloned().collect()
    }

    // =========================================================================
    // Sweep
    // =========================================================================

    /// One sweep round: expire overdue instances and offline silent
    /// nodes. Runs every 60 s from the sweeper task.
    pub fn sweep(&self) {
        let now = now_ms();

        // (a) expired instances transition and are removed by owner
        let expired: Vec<(String, String)> = {
            let mut instances = self.instances.write();
            instances
                .values_mut()
                .filter(|i| i.is_expired(now) && i.status != InstanceStatus::Expired)
                .map(|i| {
                    i.status = InstanceStatus::Expired;
                    (i.owner.clone(), i.id.clone())
                })
                .collect()
        };
        for (owner, id) in expired {
            info!(instance = %id, "instance expired");
            if let Err(e) = self.delete_instance(&owner, &id) {
                warn!(instance = %id, error = %e, "expired instance removal failed");
            }
        }

        // (b) silent nodes go offline
        let timeout_ms = self.config.heartbeat_timeout.as_millis() as u64;
        let offlined: Vec<String> = {
            let mut nodes = self.nodes.write();
            nodes
                .values_mut()
                .filter(|n| n.status == NodeStatus::Online && n.is_stale(now, timeout_ms))
                .map(|n| {
                    n.status = NodeStatus::Offline;
                    n.id.clone()
                })
                .collect()
        };
        for node_id in offlined {
            warn!(node = %node_id, "node missed heartbeats, marked offline");
            if let Some(ring) = &self.ring {
                ring.write().set_online(&node_id, false);
            }
            self.events.emit(EngineEvent::NodeLeave { node_id });
        }
    }

    /// Spawn the periodic sweep
    pub fn start_sweeper(manager: Arc<ProvisioningManager>) -> TimerTask {
        let interval = manager.config.sweep_interval;
        TimerTask::spawn("brine-provision-sweep", interval, move || {
            manager.sweep();
        })
    }
}
