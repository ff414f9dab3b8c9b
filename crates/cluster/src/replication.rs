//! Replication manager
//!
//! Fans successful mutations out to the N replicas that follow the
//! primary on the ring. Two live modes:
//!
//! - **sync**: forward to all replicas in parallel, each call bounded by
//!   `sync_timeout`; failures are logged and counted, never propagated —
//!   the primary write already succeeded.
//! - **async** (default): ops land in a queue that a periodic flusher
//!   drains (or a batch-size threshold drains early). Within a flush,
//!   ops are coalesced per key — only the latest op per key is
//!   forwarded, which preserves per-key order while dropping the
//!   superseded history.
//!
//! Delivery is at-most-once and best-effort. Replicas may lag; that is
//! the documented contract, not a defect.

use crate::ring::{HashRing, RingNode};
use async_trait::async_trait;
use brine_core::{now_ms, Result};
use brine_engine::{Engine, SetOptions};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Replication disciplines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicationMode {
    /// Replication disabled
    None,
    /// Queue and flush on a timer (the default)
    #[default]
    Async,
    /// Fan out before returning to the caller
    Sync,
}

/// Manager configuration
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Discipline
    pub mode: ReplicationMode,
    /// Number of replicas beyond the primary
    pub replica_count: usize,
    /// Per-call bound in sync mode
    pub sync_timeout: Duration,
    /// Queue drain period in async mode
    pub flush_interval: Duration,
    /// Queue size that triggers an early drain
    pub max_batch: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            mode: ReplicationMode::Async,
            replica_count: 2,
            sync_timeout: Duration::from_millis(1000),
            flush_interval: Duration::from_millis(50),
            max_batch: 100,
        }
    }
}

/// The three op kinds that cross the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaOpKind {
    /// Full-value write
    Set,
    /// Key removal
    Del,
    /// TTL assignment
    Expire,
}

/// One replicated mutation
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaOp {
    /// What to do
    pub kind: ReplicaOpKind,
    /// Target namespace
    pub namespace: String,
    /// Target key
    pub key: Vec<u8>,
    /// Payload for `Set`
    pub value: Option<Vec<u8>>,
    /// Relative TTL for `Set`/`Expire`
    pub ttl: Option<Duration>,
    /// Primary-side timestamp, ms since epoch
    pub timestamp_ms: u64,
}

impl ReplicaOp {
    fn new(kind: ReplicaOpKind, namespace: &str, key: Vec<u8>) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            key,
            value: None,
            ttl: None,
            timestamp_ms: now_ms(),
        }
    }

    /// Derive replicated ops from a dispatched command line.
    ///
    /// Only the `set`/`del`/`expire` shapes replicate — container
    /// mutations reach replicas through their own rebuild path (log
    /// replay), matching the wire contract.
    pub fn from_argv(namespace: &str, argv: &[Vec<u8>]) -> Vec<ReplicaOp> {
        let Some(name) = argv.first() else {
            return Vec::new();
        };
        match String::from_utf8_lossy(name).to_uppercase().as_str() {
            "SET" if argv.len() >= 3 => {
                let mut op = ReplicaOp::new(ReplicaOpKind::Set, namespace, argv[1].clone());
                op.value = Some(argv[2].clone());
                let mut i = 3;
                while i < argv.len() {
                    match String::from_utf8_lossy(&argv[i]).to_uppercase().as_str() {
                        "EX" => {
                            if let Some(secs) = parse_u64(argv.get(i + 1)) {
                                op.ttl = Some(Duration::from_secs(secs));
                            }
                            i += 2;
                        }
                        "PX" => {
                            if let Some(ms) = parse_u64(argv.get(i + 1)) {
                                op.ttl = Some(Duration::from_millis(ms));
                            }
                            i += 2;
                        }
                        _ => i += 1,
                    }
                }
                vec![op]
            }
            "SETNX" if argv.len() == 3 => {
                let mut op = ReplicaOp::new(ReplicaOpKind::Set, namespace, argv[1].clone());
                op.value = Some(argv[2].clone());
                vec![op]
            }
            "SETEX" if argv.len() == 4 => {
                let mut op = ReplicaOp::new(ReplicaOpKind::Set, namespace, argv[1].clone());
                op.value = Some(argv[3].clone());
                op.ttl = parse_u64(argv.get(2)).map(Duration::from_secs);
                vec![op]
            }
            "MSET" if argv.len() >= 3 && argv.len() % 2 == 1 => argv[1..]
                .chunks(2)
                .map(|pair| {
                    let mut op = ReplicaOp::new(ReplicaOpKind::Set, namespace, pair[0].clone());
                    op.value = Some(pair[1].clone());
                    op
                })
                .collect(),
            "DEL" | "GETDEL" if argv.len() >= 2 => argv[1..]
                .iter()
                .map(|key| ReplicaOp::new(ReplicaOpKind::Del, namespace, key.clone()))
                .collect(),
            "EXPIRE" if argv.len() == 3 => {
                let mut op = ReplicaOp::new(ReplicaOpKind::Expire, namespace, argv[1].clone());
                op.ttl = parse_u64(argv.get(2)).map(Duration::from_secs);
                vec![op]
            }
            "EXPIREAT" if argv.len() == 3 => {
                let mut op = ReplicaOp::new(ReplicaOpKind::Expire, namespace, argv[1].clone());
                op.ttl = parse_u64(argv.get(2)).map(|at| {
                    Duration::from_secs(at.saturating_sub(now_ms() / 1000))
                });
                vec![op]
            }
            _ => Vec::new(),
        }
    }
}

fn parse_u64(arg: Option<&Vec<u8>>) -> Option<u64> {
    arg.and_then(|a| std::str::from_utf8(a).ok())
        .and_then(|s| s.parse().ok())
}

/// Transport to a replica node. No acknowledgement protocol beyond the
/// call completing.
#[async_trait]
pub trait ReplicaTransport: Send + Sync {
    /// Deliver `ops` to `node`, in order
    async fn forward(&self, node: &RingNode, ops: &[ReplicaOp]) -> Result<()>;
}

/// In-process transport: applies ops directly to registered engines.
/// Serves single-process deployments and the test suite.
#[derive(Default)]
pub struct LoopbackTransport {
    engines: DashMap<String, Arc<Engine>>,
}

impl LoopbackTransport {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the engine standing in for `node_id`
    pub fn register(&self, node_id: &str, engine: Arc<Engine>) {
        self.engines.insert(node_id.to_string(), engine);
    }

    /// The engine registered for `node_id`
    pub fn engine(&self, node_id: &str) -> Option<Arc<Engine>> {
        self.engines.get(node_id).map(|e| Arc::clone(&e))
    }
}

#[async_trait]
impl ReplicaTransport for LoopbackTransport {
    async fn forward(&self, node: &RingNode, ops: &[ReplicaOp]) -> Result<()> {
        let engine = self
            .engines
            .get(&node.id)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| brine_core::Error::NodeUnavailable(node.id.clone()))?;
        for op in ops {
            match op.kind {
                ReplicaOpKind::Set => {
                    let value = op.value.clone().unwrap_or_default();
                    let mut opts = SetOptions::default();
                    opts.ttl = op.ttl;
                    engine.set(&op.namespace, &op.key, value, opts)?;
                }
                ReplicaOpKind::Del => {
                    engine.del(&op.namespace, &[op.key.clone()])?;
                }
                ReplicaOpKind::Expire => {
                    if let Some(ttl) = op.ttl {
                        engine.expire(&op.namespace, &op.key, ttl)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Delivery counters
#[derive(Debug, Clone, Default)]
pub struct ReplicationStats {
    /// Batches delivered
    pub delivered: u64,
    /// Batches dropped after failure or timeout
    pub failed: u64,
    /// Ops superseded by coalescing
    pub coalesced: u64,
}

/// The manager. Cheap to share behind an `Arc`.
pub struct ReplicationManager {
    config: ReplicationConfig,
    ring: Arc<RwLock<HashRing>>,
    transport: Arc<dyn ReplicaTransport>,
    queue: Mutex<Vec<ReplicaOp>>,
    delivered: AtomicU64,
    failed: AtomicU64,
    coalesced: AtomicU64,
}

impl ReplicationManager {
    /// Build a manager over a shared ring and transport
    pub fn new(
        config: ReplicationConfig,
        ring: Arc<RwLock<HashRing>>,
        transport: Arc<dyn ReplicaTransport>,
    ) -> Self {
        Self {
            config,
            ring,
            transport,
            queue: Mutex::new(Vec::new()),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// The configured mode
    pub fn mode(&self) -> ReplicationMode {
        self.config.mode
    }

    /// Ops waiting in the async queue
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Counter snapshot
    pub fn stats(&self) -> ReplicationStats {
        ReplicationStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }

    /// The replicas for `key`: `get_nodes(key, N+1)` minus the primary,
    /// which already executed the mutation locally.
    fn replicas_for(&self, key: &[u8]) -> Vec<RingNode> {
        let ring = self.ring.read();
        ring.get_nodes(key, self.config.replica_count + 1)
            .into_iter()
            .skip(1)
            .cloned()
            .collect()
    }

    /// Hand one mutation to the manager. Sync mode fans out before
    /// returning; async mode enqueues (draining early past `max_batch`);
    /// `None` drops.
    pub async fn submit(&self, op: ReplicaOp) {
        match self.config.mode {
            ReplicationMode::None => {}
            ReplicationMode::Sync => {
                self.fan_out(vec![op]).await;
            }
            ReplicationMode::Async => {
                let drain_now = {
                    let mut queue = self.queue.lock();
                    queue.push(op);
                    queue.len() >= self.config.max_batch
                };
                if drain_now {
                    self.flush().await;
                }
            }
        }
    }

    /// Drain the async queue: coalesce per key (latest op wins), then
    /// deliver per replica. Called by the flusher task and on shutdown.
    pub async fn flush(&self) {
        let drained: Vec<ReplicaOp> = std::mem::take(&mut *self.queue.lock());
        if drained.is_empty() {
            return;
        }
        let total = drained.len();

        // Coalesce: last op per (namespace, key) survives, in arrival order
        let mut latest: HashMap<(String, Vec<u8>), usize> = HashMap::new();
        for (i, op) in drained.iter().enumerate() {
            latest.insert((op.namespace.clone(), op.key.clone()), i);
        }
        let mut survivors: Vec<usize> = latest.into_values().collect();
        survivors.sort_unstable();
        self.coalesced
            .fetch_add((total - survivors.len()) as u64, Ordering::Relaxed);

        let ops: Vec<ReplicaOp> = survivors.into_iter().map(|i| drained[i].clone()).collect();
        self.fan_out(ops).await;
    }

    /// Group ops per replica node and deliver in parallel, allSettled
    /// style: every delivery is awaited, failures only count.
    async fn fan_out(&self, ops: Vec<ReplicaOp>) {
        let mut per_node: HashMap<String, (RingNode, Vec<ReplicaOp>)> = HashMap::new();
        for op in ops {
            for node in self.replicas_for(&op.key) {
                per_node
                    .entry(node.id.clone())
                    .or_insert_with(|| (node, Vec::new()))
                    .1
                    .push(op.clone());
            }
        }
        if per_node.is_empty() {
            return;
        }

        let timeout = self.config.sync_timeout;
        let mut deliveries = Vec::with_capacity(per_node.len());
        for (_, (node, batch)) in per_node {
            let transport = Arc::clone(&self.transport);
            deliveries.push(tokio::spawn(async move {
                let node_id = node.id.clone();
                let result =
                    tokio::time::timeout(timeout, transport.forward(&node, &batch)).await;
                (node_id, result)
            }));
        }
        for delivery in deliveries {
            match delivery.await {
                Ok((node_id, Ok(Ok(())))) => {
                    debug!(node = %node_id, "replica batch delivered");
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Ok((node_id, Ok(Err(e)))) => {
                    warn!(node = %node_id, error = %e, "replica delivery failed");
                    self.failed.fetch_add(1, Ordering::Relaxed);
                }
                Ok((node_id, Err(_))) => {
                    warn!(node = %node_id, "replica delivery timed out");
                    self.failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!(error = %e, "replica delivery task failed");
                    self.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Spawn the periodic flusher. It drains once more on shutdown so a
    /// clean stop loses nothing that was already queued.
    pub fn start_flusher(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.flush_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => manager.flush().await,
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            manager.flush().await;
                            return;
                        }
                    }
                }
            }
        })
    }
}
