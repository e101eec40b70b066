//! Per-Node Storage Layer
//!
//! Implements the durable state owned by a single logical node.
//!
//! ## Core Concepts
//! - **Write-ahead logging**: every mutation is appended to `<node_id>.wal`
//!   and flushed before the in-memory map changes, so replaying the log
//!   reconstructs the map after a crash.
//! - **Read caching**: a bounded LRU cache sits in front of the store; reads
//!   that hit the store populate the cache.
//! - **Batch ingest**: redistribution moves keys in batches that take the WAL
//!   mutex once and flush once.

pub mod cache;
pub mod node;
pub mod wal;


pub use cache::LruCache;
pub use node::StorageNode;
pub use wal::{StoreError, WalStore};
