//! Cluster Module Tests
//!
//! End-to-end scenarios: routing and replication, smart redistribution on
//! joins and leaves, and concurrent client traffic against the shared lock.

#[cfg(test)]
mod tests {
    use crate::cluster::coordinator::Cluster;
    use crate::cluster::types::{ClusterConfig, ClusterError, NodeId};
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn cluster_in(dir: &TempDir, replication_factor: usize) -> Cluster {
        Cluster::with_config(ClusterConfig {
            replication_factor,
            data_dir: dir.path().to_path_buf(),
            ..ClusterConfig::default()
        })
    }

    /// Which nodes currently hold `key`, regardless of the ring's opinion.
    fn holders(cluster: &Cluster, key: &str) -> BTreeSet<NodeId> {
        cluster
            .node_ids()
            .into_iter()
            .filter(|id| {
                cluster
                    .node_keys(id)
                    .is_some_and(|keys| keys.iter().any(|k| k == key))
            })
            .collect()
    }

    // ============================================================
    // ROUTING & REPLICATION
    // ============================================================

    #[test]
    fn single_node_roundtrip() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 3);
        cluster.add_node("a")?;

        cluster.put("x", "1")?;
        assert_eq!(cluster.get("x").as_deref(), Some("1"));
        assert!(cluster.remove("x"));
        assert_eq!(cluster.get("x"), None);
        Ok(())
    }

    #[test]
    fn writes_reach_every_replica() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 3);
        for id in ["a", "b", "c"] {
            cluster.add_node(id)?;
        }

        cluster.put("k", "v")?;
        let stats = cluster.distribution_stats();
        assert_eq!(
            stats.total_keys, 3,
            "rf 3 with three nodes stores one copy per node"
        );
        assert_eq!(stats.keys_per_node.len(), 3);
        Ok(())
    }

    #[test]
    fn key_survives_loss_of_any_single_node() -> anyhow::Result<()> {
        for victim in ["a", "b", "c"] {
            let dir = TempDir::new()?;
            let cluster = cluster_in(&dir, 3);
            for id in ["a", "b", "c"] {
                cluster.add_node(id)?;
            }
            cluster.put("k", "v")?;

            assert!(cluster.remove_node(&NodeId::new(victim))?);
            assert_eq!(
                cluster.get("k").as_deref(),
                Some("v"),
                "losing {victim} must not lose the key"
            );
        }
        Ok(())
    }

    #[test]
    fn put_on_empty_cluster_fails() {
        let dir = TempDir::new().unwrap();
        let cluster = cluster_in(&dir, 3);

        assert!(matches!(
            cluster.put("k", "v"),
            Err(ClusterError::NoNodesAvailable)
        ));
        assert_eq!(cluster.get("k"), None);
        assert!(!cluster.remove("k"));
    }

    #[test]
    fn empty_string_values_are_preserved() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 2);
        cluster.add_node("a")?;

        cluster.put("k", "")?;
        assert_eq!(cluster.get("k").as_deref(), Some(""));
        assert_eq!(cluster.get("other"), None);
        Ok(())
    }

    #[test]
    fn overwrites_are_visible_on_read() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 3);
        for id in ["a", "b", "c"] {
            cluster.add_node(id)?;
        }

        cluster.put("test:consistency", "version_1")?;
        cluster.put("test:consistency", "version_2")?;
        assert_eq!(
            cluster.get("test:consistency").as_deref(),
            Some("version_2")
        );
        Ok(())
    }

    // ============================================================
    // MEMBERSHIP
    // ============================================================

    #[test]
    fn duplicate_join_is_rejected() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 3);
        cluster.add_node("a")?;

        assert!(matches!(
            cluster.add_node("a"),
            Err(ClusterError::NodeExists(_))
        ));
        assert_eq!(cluster.node_count(), 1);
        Ok(())
    }

    #[test]
    fn removing_unknown_node_is_a_noop() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 3);
        cluster.add_node("a")?;

        assert!(!cluster.remove_node(&NodeId::new("ghost"))?);
        assert_eq!(cluster.node_count(), 1);
        Ok(())
    }

    #[test]
    fn ring_membership_matches_node_set() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 3);

        for id in ["a", "b", "c", "d"] {
            cluster.add_node(id)?;
        }
        cluster.remove_node(&NodeId::new("b"))?;

        let in_nodes: BTreeSet<NodeId> = cluster.node_ids().into_iter().collect();
        assert_eq!(cluster.ring_snapshot().distinct_ids(), in_nodes);
        Ok(())
    }

    #[test]
    fn replica_peers_refresh_on_join() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 3);
        for id in ["a", "b", "c"] {
            cluster.add_node(id)?;
        }

        for id in ["a", "b", "c"] {
            let peers = cluster
                .replica_peers(&NodeId::new(id))
                .expect("peers recorded for every member");
            assert_eq!(peers.len(), 2, "node {id} should see the two others");
            assert!(!peers.contains(&NodeId::new(id)));
        }
        Ok(())
    }

    // ============================================================
    // SMART REDISTRIBUTION
    // ============================================================

    #[test]
    fn join_moves_only_keys_whose_primary_changed() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 3);
        for id in ["a", "b", "c"] {
            cluster.add_node(id)?;
        }

        let keys: Vec<String> = (0..30).map(|i| format!("key_{i}")).collect();
        for (i, key) in keys.iter().enumerate() {
            cluster.put(key, &format!("value_{i}"))?;
        }

        let old_ring = cluster.ring_snapshot();
        let before: HashMap<&String, BTreeSet<NodeId>> =
            keys.iter().map(|k| (k, holders(&cluster, k))).collect();

        cluster.add_node("d")?;
        let new_ring = cluster.ring_snapshot();

        let mut changed = 0usize;
        for key in &keys {
            let now = holders(&cluster, key);
            let old_primary = old_ring.primary(key).cloned().unwrap();
            let new_primary = new_ring.primary(key).cloned().unwrap();

            assert!(
                now.contains(&new_primary),
                "{key} must live on its new primary {new_primary}"
            );

            if now != before[key] {
                changed += 1;
                assert_eq!(
                    new_primary,
                    NodeId::new("d"),
                    "only keys claimed by the joiner may move"
                );
                assert!(
                    !now.contains(&old_primary),
                    "{key} must leave its old primary {old_primary}"
                );
            } else {
                assert_eq!(new_primary, old_primary);
            }
        }

        assert!(
            changed < keys.len(),
            "a join must not reshuffle the whole keyspace"
        );
        Ok(())
    }

    #[test]
    fn leave_hands_keys_to_their_new_primary() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 1);
        for id in ["a", "b", "c"] {
            cluster.add_node(id)?;
        }

        let keys: Vec<String> = (0..30).map(|i| format!("key_{i}")).collect();
        for (i, key) in keys.iter().enumerate() {
            cluster.put(key, &format!("value_{i}"))?;
        }

        let departed = NodeId::new("b");
        let orphaned: Vec<String> = cluster.node_keys(&departed).unwrap();
        assert!(cluster.remove_node(&departed)?);

        let ring = cluster.ring_snapshot();
        for key in &orphaned {
            let primary = ring.primary(key).cloned().unwrap();
            assert!(
                holders(&cluster, key).contains(&primary),
                "{key} must land on surviving primary {primary}"
            );
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(cluster.get(key), Some(format!("value_{i}")));
        }
        Ok(())
    }

    #[test]
    fn sole_copy_follows_membership_changes() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 1);

        cluster.add_node("a")?;
        cluster.put("k", "v")?;
        cluster.add_node("b")?;
        assert!(cluster.remove_node(&NodeId::new("a"))?);

        assert_eq!(cluster.get("k").as_deref(), Some("v"));
        Ok(())
    }

    // ============================================================
    // DURABILITY ACROSS RESTARTS
    // ============================================================

    #[test]
    fn node_state_survives_cluster_restart() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        {
            let cluster = cluster_in(&dir, 1);
            cluster.add_node("a")?;
            cluster.put("user:1001", "Alice Johnson")?;
        }

        let restarted = cluster_in(&dir, 1);
        restarted.add_node("a")?;
        assert_eq!(
            restarted.get("user:1001").as_deref(),
            Some("Alice Johnson"),
            "the node must replay its wal on rejoin"
        );
        Ok(())
    }

    // ============================================================
    // CONCURRENCY
    // ============================================================

    #[test]
    fn concurrent_writers_on_disjoint_keyspaces() -> anyhow::Result<()> {
        use rand::{Rng, distr::Alphanumeric};

        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let dir = TempDir::new()?;
        let cluster = Arc::new(cluster_in(&dir, 3));
        for id in ["a", "b", "c"] {
            cluster.add_node(id)?;
        }

        let mut handles = Vec::new();
        for thread_id in 0..4 {
            let cluster = Arc::clone(&cluster);
            handles.push(std::thread::spawn(move || {
                for j in 0..50 {
                    let key = format!("thread{thread_id}:key{j}");
                    let value: String = rand::rng()
                        .sample_iter(&Alphanumeric)
                        .take(8)
                        .map(char::from)
                        .collect();
                    cluster.put(&key, &value).expect("replicated write failed");
                    assert_eq!(
                        cluster.get(&key),
                        Some(value),
                        "read-your-write violated for {key}"
                    );
                }
            }));
        }

        // A membership change racing the writers exercises the exclusive
        // side of the cluster lock.
        cluster.add_node("d")?;

        for handle in handles {
            handle.join().expect("worker thread panicked");
        }

        for thread_id in 0..4 {
            for j in 0..50 {
                let key = format!("thread{thread_id}:key{j}");
                assert!(cluster.get(&key).is_some(), "{key} lost after the join");
            }
        }
        Ok(())
    }

    // ============================================================
    // INSPECTION
    // ============================================================

    #[test]
    fn distribution_stats_serialize_for_external_tools() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let cluster = cluster_in(&dir, 2);
        for id in ["a", "b"] {
            cluster.add_node(id)?;
        }
        cluster.put("k", "v")?;

        let stats = cluster.distribution_stats();
        assert_eq!(stats.total_keys, 2);

        let json = serde_json::to_string(&stats)?;
        assert!(json.contains("\"total_keys\":2"));
        assert!(json.contains("\"a\""));
        Ok(())
    }
}
