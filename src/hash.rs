//! ## Hash capability
//! All hashing done by the sketch goes through the [`Hash64`] trait: elements,
//! flow identities and the per-slot mixing pass of the virtual indexer.
//! Any uniform deterministic 64-bit hash satisfies the contract: swapping
//! hash families changes collision statistics but not correctness.

use wyhash::wyhash;

/// 64-bit hash capability over raw bytes.
///
/// Implementations must be total (every byte string hashes) and deterministic:
/// a sketch re-derives flow positions at estimate time, so the same input and
/// seed must hash identically for the sketch's entire lifetime.
pub trait Hash64 {
    /// Hash `bytes` with the default seed.
    #[inline]
    fn hash(bytes: &[u8]) -> u64 {
        Self::hash_with_seed(bytes, 0)
    }

    /// Hash `bytes` with an explicit `seed`.
    fn hash_with_seed(bytes: &[u8], seed: u64) -> u64;
}

/// Default [`Hash64`] implementation backed by `wyhash`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WyHash64;

impl Hash64 for WyHash64 {
    #[inline]
    fn hash_with_seed(bytes: &[u8], seed: u64) -> u64 {
        wyhash(bytes, seed)
    }
}
