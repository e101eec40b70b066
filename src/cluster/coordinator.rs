//! Cluster Coordinator
//!
//! Routes client operations to replica sets and executes incremental
//! redistribution when membership changes.
//!
//! ## Locking
//! One reader/writer lock protects the ring and the node map together:
//! shared for `put`/`get`/`remove`, exclusive for membership changes. Inside
//! it, each node's WAL mutex and data lock order strictly after the cluster
//! lock, so the hierarchy is acyclic.
//!
//! ## Consistency
//! Writes broadcast synchronously to every in-cluster replica; two writers
//! racing on the same key serialize per replica on that replica's WAL, so
//! replicas may briefly disagree on which write was last. Consistency is
//! strong only within a single replica.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use tracing::{debug, info, warn};

use crate::ring::HashRing;
use crate::storage::{StorageNode, StoreError};

use super::types::{ClusterConfig, ClusterError, DistStats, NodeId};

struct ClusterState {
    ring: HashRing,
    nodes: HashMap<NodeId, StorageNode>,
}

/// An in-process cluster of logical storage nodes.
pub struct Cluster {
    state: RwLock<ClusterState>,
    /// Replica-neighbor metadata refreshed by `setup_replication`. Purely
    /// informational: routing always goes through the ring.
    replica_peers: DashMap<NodeId, Vec<NodeId>>,
    config: ClusterConfig,
}

impl Cluster {
    /// Creates an empty cluster with the given replication factor and
    /// default tunables.
    pub fn new(replication_factor: usize) -> Self {
        Self::with_config(ClusterConfig {
            replication_factor,
            ..ClusterConfig::default()
        })
    }

    pub fn with_config(config: ClusterConfig) -> Self {
        let config = ClusterConfig {
            replication_factor: config.replication_factor.max(1),
            ..config
        };
        Self {
            state: RwLock::new(ClusterState {
                ring: HashRing::new(config.virtual_nodes),
                nodes: HashMap::new(),
            }),
            replica_peers: DashMap::new(),
            config,
        }
    }

    /// Admits a node: creates its storage, inserts its virtual nodes into the
    /// ring, and moves over the keys whose primary shifted onto it.
    ///
    /// Client operations are blocked for the duration; they never observe a
    /// half-changed ring.
    pub fn add_node(&self, id: impl Into<NodeId>) -> Result<(), ClusterError> {
        let id = id.into();
        let mut state = self.state.write();
        if state.nodes.contains_key(&id) {
            return Err(ClusterError::NodeExists(id));
        }

        fs::create_dir_all(&self.config.data_dir).map_err(StoreError::from)?;
        let node = StorageNode::open(id.clone(), &self.config.data_dir, self.config.cache_capacity)?;
        state.nodes.insert(id.clone(), node);

        let old_ring = state.ring.clone();
        state.ring.add_node(&id);
        self.redistribute_on_add(&state, &id, &old_ring)?;
        self.setup_replication(&state);

        info!(node = %id, nodes = state.nodes.len(), "node joined the cluster");
        Ok(())
    }

    /// Retires a node after handing its keys to their new owners. Removing an
    /// unknown id is a logged no-op returning `false`.
    pub fn remove_node(&self, id: &NodeId) -> Result<bool, ClusterError> {
        let mut state = self.state.write();
        if !state.nodes.contains_key(id) {
            warn!(node = %id, "remove requested for a node not in the cluster");
            return Ok(false);
        }

        let old_ring = state.ring.clone();
        self.redistribute_on_remove(&state, id, &old_ring)?;
        state.ring.remove_node(id);
        state.nodes.remove(id);
        self.replica_peers.remove(id);

        info!(node = %id, nodes = state.nodes.len(), "node left the cluster");
        Ok(true)
    }

    /// Writes `value` to every replica responsible for `key`.
    ///
    /// Fails with [`ClusterError::NoNodesAvailable`] on an empty ring and
    /// with [`ClusterError::PartialWrite`] when any replica's WAL rejects the
    /// write while others accept it.
    pub fn put(&self, key: &str, value: &str) -> Result<(), ClusterError> {
        let state = self.state.read();
        let replicas = state.ring.replicas(key, self.config.replication_factor);
        if replicas.is_empty() {
            return Err(ClusterError::NoNodesAvailable);
        }
        debug!(key, replicas = replicas.len(), "routing write");

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for id in replicas {
            let Some(node) = state.nodes.get(&id) else {
                continue;
            };
            match node.put(key, value) {
                Ok(()) => succeeded.push(id),
                Err(err) => {
                    warn!(node = %id, key, %err, "replica rejected write");
                    failed.push((id, err));
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ClusterError::PartialWrite { succeeded, failed })
        }
    }

    /// Reads `key` from its replica set, returning the first value found.
    /// `None` means no replica holds the key.
    pub fn get(&self, key: &str) -> Option<String> {
        let state = self.state.read();
        for id in state.ring.replicas(key, self.config.replication_factor) {
            if let Some(node) = state.nodes.get(&id)
                && let Some(value) = node.get(key)
            {
                return Some(value);
            }
        }
        None
    }

    /// Deletes `key` from its replica set. Returns `true` if any replica
    /// actually held the key.
    pub fn remove(&self, key: &str) -> bool {
        let state = self.state.read();
        let mut removed = false;
        for id in state.ring.replicas(key, self.config.replication_factor) {
            let Some(node) = state.nodes.get(&id) else {
                continue;
            };
            match node.remove(key) {
                Ok(erased) => removed |= erased,
                Err(err) => warn!(node = %id, key, %err, "replica delete failed"),
            }
        }
        removed
    }

    /// Per-node key counts and the cluster total.
    pub fn distribution_stats(&self) -> DistStats {
        let state = self.state.read();
        let mut stats = DistStats::default();
        for (id, node) in &state.nodes {
            let count = node.key_count();
            stats.total_keys += count;
            stats.keys_per_node.insert(id.clone(), count);
        }
        stats
    }

    /// The replica neighbors recorded for `id` by the last membership change.
    pub fn replica_peers(&self, id: &NodeId) -> Option<Vec<NodeId>> {
        self.replica_peers.get(id).map(|entry| entry.value().clone())
    }

    /// Ids of the current members, sorted.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let state = self.state.read();
        let mut ids: Vec<NodeId> = state.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Keys currently stored on one node, for inspection.
    pub fn node_keys(&self, id: &NodeId) -> Option<Vec<String>> {
        self.state.read().nodes.get(id).map(StorageNode::all_keys)
    }

    /// A value copy of the current ring geometry.
    pub fn ring_snapshot(&self) -> HashRing {
        self.state.read().ring.clone()
    }

    /// Moves to `new_id` exactly those keys whose primary responsibility
    /// shifted onto it: keys a donor held as primary under `old_ring` whose
    /// primary under the mutated ring is the new node. Each key moves at most
    /// once, and in expectation only K/|nodes| keys move at all.
    ///
    /// Only primary responsibility migrates; the new node picks up replica
    /// copies of other keys through future writes.
    fn redistribute_on_add(
        &self,
        state: &ClusterState,
        new_id: &NodeId,
        old_ring: &HashRing,
    ) -> Result<(), ClusterError> {
        let Some(new_node) = state.nodes.get(new_id) else {
            return Ok(());
        };

        let mut moved_total = 0usize;
        for (donor_id, donor) in &state.nodes {
            if donor_id == new_id {
                continue;
            }
            let to_move = donor.keys_for_redistribution(|key| {
                old_ring.primary(key) == Some(donor_id)
                    && state.ring.primary(key) == Some(new_id)
            });
            if to_move.is_empty() {
                continue;
            }

            let keys: Vec<String> = to_move.keys().cloned().collect();
            new_node.put_batch(&to_move)?;
            donor.remove_batch(&keys)?;
            debug!(
                from = %donor_id,
                to = %new_id,
                moved = keys.len(),
                "shifted primary ownership"
            );
            moved_total += keys.len();
        }

        if moved_total > 0 {
            info!(node = %new_id, moved = moved_total, "join redistribution complete");
        }
        Ok(())
    }

    /// Regroups the departing node's keys by their primary under the ring as
    /// it will look without it, then batch-copies each group to its new
    /// owner. Replicas already held by surviving nodes are left in place.
    fn redistribute_on_remove(
        &self,
        state: &ClusterState,
        departing: &NodeId,
        old_ring: &HashRing,
    ) -> Result<(), ClusterError> {
        let Some(node) = state.nodes.get(departing) else {
            return Ok(());
        };

        let mut survivor_ring = old_ring.clone();
        survivor_ring.remove_node(departing);

        let mut groups: HashMap<NodeId, HashMap<String, String>> = HashMap::new();
        for (key, value) in node.all_data() {
            match survivor_ring.primary(&key) {
                Some(target) => {
                    groups.entry(target.clone()).or_default().insert(key, value);
                }
                None => {
                    // Last node leaving: its data goes away with it.
                    debug!(%key, "no surviving node to inherit key");
                }
            }
        }

        let mut moved_total = 0usize;
        for (target, entries) in &groups {
            match state.nodes.get(target) {
                Some(target_node) => {
                    target_node.put_batch(entries)?;
                    moved_total += entries.len();
                }
                None => warn!(
                    target = %target,
                    keys = entries.len(),
                    "redistribution target missing, keys not transferred"
                ),
            }
        }

        info!(
            node = %departing,
            moved = moved_total,
            "leave redistribution complete"
        );
        Ok(())
    }

    /// Recomputes each member's replica neighbors from the current ring.
    fn setup_replication(&self, state: &ClusterState) {
        self.replica_peers.clear();
        for id in state.nodes.keys() {
            let peers: Vec<NodeId> = state
                .ring
                .replicas(id.as_str(), self.config.replication_factor)
                .into_iter()
                .filter(|peer| peer != id)
                .collect();
            self.replica_peers.insert(id.clone(), peers);
        }
    }
}
