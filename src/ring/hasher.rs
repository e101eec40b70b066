use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Signature of a ring hash function. Injected into [`HashRing`] so tests can
/// pin exact geometries with hand-written functions.
///
/// [`HashRing`]: super::HashRing
pub type RingHashFn = fn(&str) -> u32;

/// Default ring hash: SipHash-1-3 with fixed keys, truncated to 32 bits.
///
/// Placement must be identical across runs and processes, so the randomly
/// seeded std hasher is not an option here.
pub fn sip_hash32(key: &str) -> u32 {
    let mut hasher = SipHasher13::new_with_keys(0x72696e_676b76, 0);
    hasher.write(key.as_bytes());
    hasher.finish() as u32
}
