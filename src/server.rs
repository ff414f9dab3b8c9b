//! Server assembly
//!
//! Explicit construction, no module globals: everything the process
//! owns — engines, ring, replication, log, timers, listener — hangs off
//! one [`Server`] value created at startup and torn down by
//! [`Server::shutdown`].
//!
//! Startup order matters: the log replays into the shared engine
//! *before* the log attaches as its mutation sink, otherwise replayed
//! records would be re-appended.

use brine_cluster::{
    HashRing, LatencyProbe, LoopbackTransport, RegionalRouter, ReplicaOp, ReplicationConfig,
    ReplicationManager, RouterConfig,
};
use brine_core::Result;
use brine_durability::{maybe_rewrite, replay_into, AofConfig, AofLog};
use brine_engine::{spawn_expiry_sweeper, Engine, TimerTask};
use brine_provision::{ProvisioningConfig, ProvisioningManager};
use brine_wire::{EngineResolver, MutationObserver, RespServer, RespServerConfig};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Whole-process configuration, assembled by the embedding caller
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// RESP listener settings
    pub resp: RespServerConfig,
    /// Provisioning settings, including the shared engine's limits
    pub provisioning: ProvisioningConfig,
    /// Replication settings
    pub replication: ReplicationConfig,
    /// Append-only log; `None` disables durability
    pub aof: Option<AofConfig>,
    /// Regional router settings
    pub router: RouterConfig,
    /// Latency prober; `None` leaves region estimates at their defaults
    pub latency_probe: Option<Arc<dyn LatencyProbe>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("resp", &self.resp)
            .field("replication_mode", &self.replication.mode)
            .field("aof", &self.aof)
            .finish_non_exhaustive()
    }
}

/// The running system
pub struct Server {
    provisioning: Arc<ProvisioningManager>,
    ring: Arc<RwLock<HashRing>>,
    replication: Arc<ReplicationManager>,
    router: Arc<RegionalRouter>,
    aof: Option<Arc<AofLog>>,
    timers: Vec<TimerTask>,
    shutdown_tx: watch::Sender<bool>,
    listener: JoinHandle<std::io::Result<()>>,
    repl_flusher: JoinHandle<()>,
}

/// Adapter: provisioning's namespace dispatch behind the wire layer's
/// resolver seam
struct NamespaceResolver(Arc<ProvisioningManager>);

impl EngineResolver for NamespaceResolver {
    fn engine_for(&self, namespace: &str) -> Arc<Engine> {
        self.0.engine_for_namespace(namespace)
    }
}

/// Adapter: successful write commands become replication ops
struct ReplicationBridge(Arc<ReplicationManager>);

#[async_trait::async_trait]
impl MutationObserver for ReplicationBridge {
    async fn on_mutation(&self, namespace: &str, argv: &[Vec<u8>]) {
        for op in ReplicaOp::from_argv(namespace, argv) {
            self.0.submit(op).await;
        }
    }
}

impl Server {
    /// Assemble and start everything: replay the log, attach it, spawn
    /// the background tasks, bind the listener.
    pub async fn start(config: ServerConfig) -> Result<Server> {
        let ring = Arc::new(RwLock::new(HashRing::default()));
        let provisioning = Arc::new(
            ProvisioningManager::new(config.provisioning.clone()).with_ring(Arc::clone(&ring)),
        );
        let shared = provisioning.shared_engine();

        // Durability: replay first, then attach the sink
        let aof = match &config.aof {
            Some(aof_config) => {
                let stats = replay_into(&aof_config.path, &shared)?;
                if stats.applied > 0 || stats.skipped > 0 {
                    info!(
                        applied = stats.applied,
                        skipped = stats.skipped,
                        "recovered keyspace from append-only log"
                    );
                }
                let log = Arc::new(AofLog::open(aof_config.clone())?);
                shared.set_mutation_log(Arc::clone(&log) as _);
                Some(log)
            }
            None => None,
        };

        // Cluster plumbing
        let transport = Arc::new(LoopbackTransport::new());
        let replication = Arc::new(ReplicationManager::new(
            config.replication.clone(),
            Arc::clone(&ring),
            transport,
        ));
        let router = Arc::new(RegionalRouter::new(
            config.router.clone(),
            Arc::clone(&ring),
        ));

        // Background timers — every one is stopped and joined on shutdown
        let mut timers = vec![
            spawn_expiry_sweeper(Arc::clone(&shared)),
            ProvisioningManager::start_sweeper(Arc::clone(&provisioning)),
        ];
        if let Some(log) = &aof {
            timers.push(AofLog::start_flusher(Arc::clone(log)));
            let log = Arc::clone(log);
            let engine = Arc::clone(&shared);
            timers.push(TimerTask::spawn(
                "brine-aof-compact",
                Duration::from_secs(10),
                move || {
                    if let Err(e) = maybe_rewrite(&log, &engine) {
                        warn!(error = %e, "log compaction failed");
                    }
                },
            ));
        }
        if let Some(probe) = &config.latency_probe {
            timers.push(RegionalRouter::start_probe_task(
                Arc::clone(&router),
                Arc::clone(probe),
            ));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let repl_flusher = replication.start_flusher(shutdown_rx.clone());

        let resp = RespServer::new(
            config.resp.clone(),
            Arc::new(NamespaceResolver(Arc::clone(&provisioning))),
        )
        .with_observer(Arc::new(ReplicationBridge(Arc::clone(&replication))));
        let listener = tokio::spawn(resp.run(shutdown_rx));

        Ok(Server {
            provisioning,
            ring,
            replication,
            router,
            aof,
            timers,
            shutdown_tx,
            listener,
            repl_flusher,
        })
    }

    /// The provisioning manager (control-surface entry point)
    pub fn provisioning(&self) -> &Arc<ProvisioningManager> {
        &self.provisioning
    }

    /// The shared default-namespace engine
    pub fn shared_engine(&self) -> Arc<Engine> {
        self.provisioning.shared_engine()
    }

    /// The cluster ring
    pub fn ring(&self) -> &Arc<RwLock<HashRing>> {
        &self.ring
    }

    /// The replication manager
    pub fn replication(&self) -> &Arc<ReplicationManager> {
        &self.replication
    }

    /// The regional router
    pub fn router(&self) -> &Arc<RegionalRouter> {
        &self.router
    }

    /// Stop everything in dependency order: listener and replication
    /// flusher first, then the timers, then a final log flush.
    pub async fn shutdown(mut self) {
        info!("server shutting down");
        let _ = self.shutdown_tx.send(true);
        let _ = self.repl_flusher.await;
        let _ = self.listener.await;
        for mut timer in self.timers.drain(..) {
            timer.stop();
        }
        if let Some(log) = &self.aof {
            if let Err(e) = log.flush() {
                warn!(error = %e, "final log flush failed");
            }
        }
        info!("server shutdown complete");
    }
}
