use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StoreError;

/// Unique identifier for a node in the cluster.
/// Any non-empty string works; ids name WAL files, so keep them path-friendly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random UUID v4-based NodeId.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Tunables for a cluster instance.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Desired number of distinct replicas per key. Capped by the node count.
    pub replication_factor: usize,
    /// Ring positions per physical node. More positions smooth the key
    /// distribution at the cost of ring memory.
    pub virtual_nodes: usize,
    /// Per-node LRU read cache size, in entries.
    pub cache_capacity: usize,
    /// Directory holding the per-node `<id>.wal` files.
    pub data_dir: PathBuf,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            replication_factor: 3,
            virtual_nodes: 100,
            cache_capacity: 1000,
            data_dir: PathBuf::from("."),
        }
    }
}

/// Failures surfaced by cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A write was attempted while the ring had no nodes.
    #[error("no nodes available")]
    NoNodesAvailable,

    /// `add_node` was called with an id already in the cluster. Admitting it
    /// would insert duplicate virtual nodes into the ring.
    #[error("node {0} is already part of the cluster")]
    NodeExists(NodeId),

    /// Some replicas accepted a write and others failed; the write is
    /// partially durable.
    #[error("write reached {} of {} replicas", .succeeded.len(), .succeeded.len() + .failed.len())]
    PartialWrite {
        succeeded: Vec<NodeId>,
        failed: Vec<(NodeId, StoreError)>,
    },

    /// Storage-layer failure outside the replica fan-out path.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-node key counts plus the cluster-wide total, for tests and inspection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DistStats {
    pub keys_per_node: BTreeMap<NodeId, usize>,
    pub total_keys: usize,
}
