use std::collections::{BTreeMap, BTreeSet, btree_map::Entry};

use crate::cluster::NodeId;

use super::hasher::{RingHashFn, sip_hash32};

/// Consistent hash ring with virtual nodes.
///
/// The ring holds `virtual_nodes` positions per physical node id. Position
/// collisions between different nodes are resolved deterministically: the
/// lexicographically smaller id claims the position regardless of insertion
/// order, and `remove_node` only erases a position whose occupant is the
/// departing node. A collision loser simply owns one position fewer.
#[derive(Debug, Clone)]
pub struct HashRing {
    positions: BTreeMap<u32, NodeId>,
    virtual_nodes: usize,
    hash_fn: RingHashFn,
}

impl HashRing {
    /// Creates a ring using the default stable hash.
    pub fn new(virtual_nodes: usize) -> Self {
        Self::with_hash_fn(virtual_nodes, sip_hash32)
    }

    /// Creates a ring with a caller-supplied hash function.
    pub fn with_hash_fn(virtual_nodes: usize, hash_fn: RingHashFn) -> Self {
        Self {
            positions: BTreeMap::new(),
            virtual_nodes: virtual_nodes.max(1),
            hash_fn,
        }
    }

    /// Hashes a key to its ring position.
    pub fn hash(&self, key: &str) -> u32 {
        (self.hash_fn)(key)
    }

    /// Inserts the V virtual-node positions for `id`.
    ///
    /// Not idempotent-safe: the caller must ensure `id` is not already in the
    /// ring (the cluster coordinator guards this).
    pub fn add_node(&mut self, id: &NodeId) {
        for i in 0..self.virtual_nodes {
            let position = (self.hash_fn)(&format!("{id}{i}"));
            match self.positions.entry(position) {
                Entry::Vacant(slot) => {
                    slot.insert(id.clone());
                }
                Entry::Occupied(mut slot) => {
                    if *id < *slot.get() {
                        slot.insert(id.clone());
                    }
                }
            }
        }
    }

    /// Erases the virtual-node positions owned by `id`.
    pub fn remove_node(&mut self, id: &NodeId) {
        for i in 0..self.virtual_nodes {
            let position = (self.hash_fn)(&format!("{id}{i}"));
            if let Entry::Occupied(slot) = self.positions.entry(position)
                && slot.get() == id
            {
                slot.remove();
            }
        }
    }

    /// Returns the node primarily responsible for `key`, or `None` on an
    /// empty ring.
    pub fn primary(&self, key: &str) -> Option<&NodeId> {
        if self.positions.is_empty() {
            return None;
        }
        let position = self.hash(key);
        self.positions
            .range(position..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, id)| id)
    }

    /// Returns up to `count` distinct node ids responsible for `key`, in
    /// clockwise discovery order starting at `hash(key)`.
    ///
    /// The walk makes at most one full pass over the ring, so the result is
    /// shorter than `count` exactly when the ring holds fewer distinct nodes.
    pub fn replicas(&self, key: &str, count: usize) -> Vec<NodeId> {
        let mut found = Vec::new();
        if self.positions.is_empty() || count == 0 {
            return found;
        }
        let position = self.hash(key);
        let walk = self
            .positions
            .range(position..)
            .chain(self.positions.range(..position));
        for (_, id) in walk {
            if found.len() == count {
                break;
            }
            if !found.contains(id) {
                found.push(id.clone());
            }
        }
        found
    }

    /// The set of distinct node ids currently on the ring.
    pub fn distinct_ids(&self) -> BTreeSet<NodeId> {
        self.positions.values().cloned().collect()
    }

    /// Number of virtual-node entries on the ring.
    pub fn vnode_len(&self) -> usize {
        self.positions.len()
    }

    /// True if no node has been added.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
