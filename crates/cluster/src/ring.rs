//! Consistent hash ring with virtual nodes
//!
//! Each real node contributes `vnodes_per_node` positions at
//! `xxh32(node_id + ":" + i)`. A key lands on the first vnode clockwise
//! from `xxh32(key)`. The hash is deterministic across restarts and the
//! same function places vnodes and keys, so a fixed node set always
//! yields the same owner for a key.

use brine_core::Tier;
use serde::Serialize;
use std::collections::HashMap;
use xxhash_rust::xxh32::xxh32;

/// Default virtual nodes per real node
pub const DEFAULT_VNODES_PER_NODE: usize = 150;

const HASH_SEED: u32 = 0;

/// A ring member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingNode {
    /// Cluster-unique identifier
    pub id: String,
    /// Reachable endpoint (host:port)
    pub endpoint: String,
    /// Geographic region tag
    pub region: String,
    /// Service tier
    pub tier: Tier,
    /// Offline nodes stay on the ring but are skipped by lookups
    pub online: bool,
}

/// The ring: sorted vnode positions plus the member table
#[derive(Debug)]
pub struct HashRing {
    vnodes_per_node: usize,
    // (position, node id), sorted by position then id for determinism
    ring: Vec<(u32, String)>,
    nodes: HashMap<String, RingNode>,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_VNODES_PER_NODE)
    }
}

impl HashRing {
    /// Create an empty ring with the given vnode count per node
    pub fn new(vnodes_per_node: usize) -> Self {
        Self {
            vnodes_per_node: vnodes_per_node.max(1),
            ring: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    /// The placement hash, exposed for tests
    pub fn hash_key(key: &[u8]) -> u32 {
        xxh32(key, HASH_SEED)
    }

    /// Add a node, or replace its previous placement when re-added
    pub fn add_node(&mut self, node: RingNode) {
        if self.nodes.contains_key(&node.id) {
            self.remove_placement(&node.id);
        }
        for i in 0..self.vnodes_per_node {
            let position = xxh32(format!("{}:{}", node.id, i).as_bytes(), HASH_SEED);
            self.ring.push((position, node.id.clone()));
        }
        self.ring.sort();
        self.nodes.insert(node.id.clone(), node);
    }

    /// Remove a node and all its vnodes. Only keys it owned move.
    pub fn remove_node(&mut self, node_id: &str) -> Option<RingNode> {
        let removed = self.nodes.remove(node_id);
        if removed.is_some() {
            self.remove_placement(node_id);
        }
        removed
    }

    fn remove_placement(&mut self, node_id: &str) {
        self.ring.retain(|(_, id)| id != node_id);
    }

    /// Flip a node's online flag without touching its placement
    pub fn set_online(&mut self, node_id: &str, online: bool) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                node.online = online;
                true
            }
            None => false,
        }
    }

    /// Member lookup
    pub fn node(&self, node_id: &str) -> Option<&RingNode> {
        self.nodes.get(node_id)
    }

    /// All members
    pub fn nodes(&self) -> impl Iterator<Item = &RingNode> {
        self.nodes.values()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the ring has no members
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The primary owner of `key`: the first online node at or after the
    /// key's position, wrapping around.
    pub fn get_node(&self, key: &[u8]) -> Option<&RingNode> {
        self.get_nodes(key, 1).into_iter().next()
    }

    /// Up to `count` distinct online nodes for `key`, walking clockwise.
    /// Offline nodes are skipped but keep their ring positions.
    pub fn get_nodes(&self, key: &[u8], count: usize) -> Vec<&RingNode> {
        if self.ring.is_empty() || count == 0 {
            return Vec::new();
        }
        let target = Self::hash_key(key);
        let start = self
            .ring
            .partition_point(|(position, _)| *position < target);

        let mut out: Vec<&RingNode> = Vec::with_capacity(count);
        for offset in 0..self.ring.len() {
            let (_, id) = &self.ring[(start + offset) % self.ring.len()];
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !node.online {
                continue;
            }
            if out.iter().any(|n| n.id == node.id) {
                continue;
            }
            out.push(node);
            if out.len() == count {
                break;
            }
        }
        out
    }
}
