//! Regional router: latency-aware replica selection
//!
//! A thin wrapper over the ring. For a key it takes the top 5 ring
//! candidates, filters by tier when asked (falling back to the
//! unfiltered set if the filter empties it), and picks the lowest
//! estimated latency. The local region is pinned to 1 ms; regions we
//! have never probed cost a pessimistic 100 ms.

use crate::ring::{HashRing, RingNode};
use brine_core::Tier;
use brine_engine::TimerTask;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Candidates considered per lookup
const CANDIDATE_COUNT: usize = 5;

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// The region this process runs in
    pub local_region: String,
    /// Probe period for non-local regions
    pub latency_probe_interval: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            local_region: "local".to_string(),
            latency_probe_interval: Duration::from_secs(30),
        }
    }
}

/// Latency assumed for the local region
pub const LOCAL_LATENCY_MS: u64 = 1;
/// Latency assumed for regions never probed
pub const DEFAULT_LATENCY_MS: u64 = 100;

/// Issues a liveness round-trip to a node. The prober is external so
/// tests and single-process deployments can stub it.
pub trait LatencyProbe: Send + Sync {
    /// Measure one round-trip; `None` when the node did not answer
    fn probe(&self, node: &RingNode) -> Option<Duration>;
}

/// The router
pub struct RegionalRouter {
    config: RouterConfig,
    ring: Arc<RwLock<HashRing>>,
    latencies: RwLock<HashMap<String, u64>>,
}

impl RegionalRouter {
    /// Build a router over a shared ring
    pub fn new(config: RouterConfig, ring: Arc<RwLock<HashRing>>) -> Self {
        Self {
            config,
            ring,
            latencies: RwLock::new(HashMap::new()),
        }
    }

    /// Estimated latency to `region` in milliseconds
    pub fn latency_for(&self, region: &str) -> u64 {
        if region == self.config.local_region {
            return LOCAL_LATENCY_MS;
        }
        self.latencies
            .read()
            .get(region)
            .copied()
            .unwrap_or(DEFAULT_LATENCY_MS)
    }

    /// Record a measured round-trip
    pub fn record_latency(&self, region: &str, latency: Duration) {
        self.latencies
            .write()
            .insert(region.to_string(), latency.as_millis() as u64);
    }

    /// The best replica for `key`: top ring candidates, tier-filtered
    /// when requested, sorted by estimated latency.
    pub fn get_best_node(&self, key: &[u8], tier: Option<Tier>) -> Option<RingNode> {
        let ring = self.ring.read();
        let candidates: Vec<RingNode> = ring
            .get_nodes(key, CANDIDATE_COUNT)
            .into_iter()
            .cloned()
            .collect();
        drop(ring);
        if candidates.is_empty() {
            return None;
        }

        let filtered: Vec<&RingNode> = match tier {
            Some(wanted) => {
                let matching: Vec<&RingNode> =
                    candidates.iter().filter(|n| n.tier == wanted).collect();
                if matching.is_empty() {
                    // Tier filter emptied the set; serve from any tier
                    candidates.iter().collect()
                } else {
                    matching
                }
            }
            None => candidates.iter().collect(),
        };

        filtered
            .into_iter()
            .min_by_key(|n| self.latency_for(&n.region))
            .cloned()
    }

    /// One probe round: a single node per non-local region
    pub fn run_probe(&self, probe: &dyn LatencyProbe) {
        let targets: Vec<RingNode> = {
            let ring = self.ring.read();
            let mut seen = std::collections::HashSet::new();
            ring.nodes()
                .filter(|n| n.online && n.region != self.config.local_region)
                .filter(|n| seen.insert(n.region.clone()))
                .cloned()
                .collect()
        };
        for node in targets {
            if let Some(rtt) = probe.probe(&node) {
                debug!(region = %node.region, rtt_ms = rtt.as_millis() as u64, "latency probe");
                self.record_latency(&node.region, rtt);
            }
        }
    }

    /// Spawn the periodic probe task
    pub fn start_probe_task(
        router: Arc<RegionalRouter>,
        probe: Arc<dyn LatencyProbe>,
    ) -> TimerTask {
        let interval = router.config.latency_probe_interval;
        TimerTask::spawn("brine-latency-probe", interval, move || {
            router.run_probe(probe.as_ref());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, region: &str, tier: Tier) -> RingNode {
        RingNode {
            id: id.to_string(),
            endpoint: format!("{}:6379", id),
            region: region.to_string(),
            tier,
            online: true,
        }
    }

    fn router_with(nodes: Vec<RingNode>) -> RegionalRouter {
        let mut ring = HashRing::default();
        for n in nodes {
            ring.add_node(n);
        }
        let config = RouterConfig {
            local_region: "us-east".to_string(),
            ..RouterConfig::default()
        };
        RegionalRouter::new(config, Arc::new(RwLock::new(ring)))
    }

    #[test]
    fn test_local_region_wins_by_default() {
        let router = router_with(vec![
            node("far", "eu-west", Tier::Standard),
            node("near", "us-east", Tier::Standard),
        ]);
        let best = router.get_best_node(b"key", None).unwrap();
        assert_eq!(best.id, "near");
        assert_eq!(router.latency_for("us-east"), LOCAL_LATENCY_MS);
        assert_eq!(router.latency_for("eu-west"), DEFAULT_LATENCY_MS);
    }

    #[test]
    fn test_recorded_latency_changes_choice() {
        let router = router_with(vec![
            node("a", "eu-west", Tier::Standard),
            node("b", "ap-south", Tier::Standard),
        ]);
        router.record_latency("eu-west", Duration::from_millis(80));
        router.record_latency("ap-south", Duration::from_millis(20));
        let best = router.get_best_node(b"key", None).unwrap();
        assert_eq!(best.region, "ap-south");
    }

    #[test]
    fn test_tier_filter_with_fallback() {
        let router = router_with(vec![
            node("std", "us-east", Tier::Standard),
            node("tee", "eu-west", Tier::Tee),
        ]);
        let best = router.get_best_node(b"key", Some(Tier::Tee)).unwrap();
        assert_eq!(best.id, "tee");

        // No premium node anywhere: fall back to the unfiltered set
        let best = router.get_best_node(b"key", Some(Tier::Premium)).unwrap();
        assert_eq!(best.id, "std");
    }

    #[test]
    fn test_empty_ring_yields_none() {
        let router = router_with(vec![]);
        assert!(router.get_best_node(b"key", None).is_none());
    }

    #[test]
    fn test_probe_records_one_node_per_region() {
        struct FixedProbe;
        impl LatencyProbe for FixedProbe {
            fn probe(&self, node: &RingNode) -> Option<Duration> {
                match node.region.as_str() {
                    "eu-west" => Some(Duration::from_millis(42)),
                    _ => None,
                }
            }
        }
        let router = router_with(vec![
            node("a", "eu-west", Tier::Standard),
            node("b", "eu-west", Tier::Standard),
            node("c", "ap-south", Tier::Standard),
            node("local", "us-east", Tier::Standard),
        ]);
        router.run_probe(&FixedProbe);
        assert_eq!(router.latency_for("eu-west"), 42);
        // Unanswered probe leaves the default in place
        assert_eq!(router.latency_for("ap-south"), DEFAULT_LATENCY_MS);
        // Local region is never probed, stays pinned
        assert_eq!(router.latency_for("us-east"), LOCAL_LATENCY_MS);
    }
}
