//! Cluster Coordination Layer
//!
//! Owns the node set and the hash ring, and keeps them consistent.
//!
//! ## Core Concepts
//! - **Routing**: `put`/`get`/`remove` run under a shared cluster lock,
//!   compute the key's replica set from the ring, and fan out to those nodes.
//!   Writes are synchronous broadcasts; reads return the first replica that
//!   has a value.
//! - **Membership**: `add_node`/`remove_node` take the cluster lock
//!   exclusively, so clients never observe a half-changed ring.
//! - **Smart redistribution**: a membership change snapshots the pre-change
//!   ring, mutates the live one, and moves only the keys whose responsible
//!   node actually changed — O(K / nodes) keys in expectation instead of a
//!   full rehash.

pub mod coordinator;
pub mod types;

#[cfg(test)]
mod tests;

pub use coordinator::Cluster;
pub use types::{ClusterConfig, ClusterError, DistStats, NodeId};
