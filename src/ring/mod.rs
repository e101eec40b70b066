//! Consistent Hashing Ring
//!
//! Maps keys to an ordered set of responsible nodes on a 32-bit hash ring.
//!
//! ## Mechanism
//! - **Virtual nodes**: each physical node id is inserted at V ring positions
//!   (`hash(id || i)` for i in 0..V) to smooth the key distribution.
//! - **Lookup**: a key's primary is the node at the first ring position at or
//!   after `hash(key)`, wrapping around to the smallest position. Replica sets
//!   are collected by continuing the clockwise walk until enough distinct ids
//!   are found.
//! - **Snapshots**: the ring is a plain value and `Clone` is cheap, so the
//!   cluster coordinator can keep the pre-change geometry and diff ownership
//!   key by key when membership changes.

pub mod hasher;
pub mod ring;


pub use hasher::{RingHashFn, sip_hash32};
pub use ring::HashRing;
