//! In-Process Distributed Key-Value Store
//!
//! This library crate simulates a replicated key-value cluster inside a single
//! process: logical nodes are co-located objects, there is no network layer,
//! and all client operations run on plain OS threads.
//!
//! ## Architecture Modules
//! The system is composed of three loosely coupled subsystems:
//!
//! - **`ring`**: The placement layer. A consistent hash ring with virtual
//!   nodes maps every key to an ordered replica set on a 32-bit hash space,
//!   and supports cheap value snapshots so membership changes can diff key
//!   ownership exactly.
//! - **`storage`**: The per-node durable state layer. Each node owns an
//!   append-only write-ahead log in front of an in-memory map, fronted by a
//!   bounded LRU read cache.
//! - **`cluster`**: The coordination layer. Routes puts/gets/deletes to the
//!   replica set under a shared cluster lock, and performs *smart
//!   redistribution* on membership changes: only keys whose responsible node
//!   actually changed are moved.

pub mod cluster;
pub mod ring;
pub mod storage;

pub use cluster::{Cluster, ClusterConfig, ClusterError, DistStats, NodeId};
pub use ring::HashRing;
pub use storage::{LruCache, StorageNode, StoreError, WalStore};
