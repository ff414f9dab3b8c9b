//! Ring placement scenarios: distribution, node removal stability, and
//! offline skipping.

use brinedb::{HashRing, RingNode, Tier};
use proptest::prelude::*;
use std::collections::HashMap;

fn node(id: &str) -> RingNode {
    RingNode {
        id: id.to_string(),
        endpoint: format!("{}.internal:6379", id),
        region: "us-east".to_string(),
        tier: Tier::Standard,
        online: true,
    }
}

fn keys(n: usize) -> Vec<Vec<u8>> {
    (0..n).map(|i| format!("key:{:04}", i).into_bytes()).collect()
}

#[test]
fn scenario_e_two_node_ring_split_and_removal() {
    let mut ring = HashRing::new(150);
    ring.add_node(node("A"));
    ring.add_node(node("B"));

    let owners: HashMap<Vec<u8>, String> = keys(1000)
        .into_iter()
        .map(|k| {
            let owner = ring.get_node(&k).unwrap().id.clone();
            (k, owner)
        })
        .collect();

    let to_a = owners.values().filter(|o| o.as_str() == "A").count();
    let to_b = 1000 - to_a;
    assert!(to_a <= 900, "A owns {} of 1000", to_a);
    assert!(to_b <= 900, "B owns {} of 1000", to_b);

    ring.remove_node("B");
    for (key, owner_before) in owners {
        let owner_after = ring.get_node(&key).unwrap().id.clone();
        assert_eq!(owner_after, "A", "all keys map to A after removal");
        if owner_before == "A" {
            // Keys that already lived on A never moved
            assert_eq!(owner_before, owner_after);
        }
    }
}

#[test]
fn property_unrelated_churn_leaves_placement_alone() {
    let mut ring = HashRing::default();
    ring.add_node(node("A"));
    ring.add_node(node("B"));
    ring.add_node(node("C"));

    let sample = keys(500);
    let before: Vec<String> = sample
        .iter()
        .map(|k| ring.get_node(k).unwrap().id.clone())
        .collect();

    // Add and remove an unrelated node
    ring.add_node(node("D"));
    ring.remove_node("D");

    for (key, owner_before) in sample.iter().zip(before) {
        assert_eq!(ring.get_node(key).unwrap().id, owner_before);
    }
}

#[test]
fn offline_node_is_skipped_for_replica_sets() {
    let mut ring = HashRing::default();
    for id in ["A", "B", "C"] {
        ring.add_node(node(id));
    }
    ring.set_online("B", false);

    for key in keys(100) {
        let replicas = ring.get_nodes(&key, 3);
        assert_eq!(replicas.len(), 2, "offline node excluded");
        assert!(replicas.iter().all(|n| n.id != "B"));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn property_same_key_same_node(key in proptest::collection::vec(any::<u8>(), 0..64)) {
        let build = || {
            let mut ring = HashRing::default();
            for id in ["n1", "n2", "n3", "n4", "n5"] {
                ring.add_node(node(id));
            }
            ring
        };
        let a = build();
        let b = build();
        prop_assert_eq!(
            a.get_node(&key).map(|n| n.id.clone()),
            b.get_node(&key).map(|n| n.id.clone())
        );
    }

    #[test]
    fn property_removal_only_moves_removed_nodes_keys(
        sample in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..32), 1..100)
    ) {
        let mut ring = HashRing::default();
        for id in ["n1", "n2", "n3"] {
            ring.add_node(node(id));
        }
        let before: Vec<Option<String>> = sample
            .iter()
            .map(|k| ring.get_node(k).map(|n| n.id.clone()))
            .collect();

        ring.remove_node("n2");
        for (key, owner_before) in sample.iter().zip(before) {
            let owner_after = ring.get_node(key).map(|n| n.id.clone());
            match owner_before.as_deref() {
                Some("n2") => prop_assert_ne!(owner_after.as_deref(), Some("n2")),
                other => prop_assert_eq!(owner_after.as_deref(), other),
            }
        }
    }
}
