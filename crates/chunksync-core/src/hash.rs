//! Content hashing — XXH3-128 over chunk payloads.
//!
//! The hash detects differing chunks; it is not authentication. Both peers
//! must compute identical values for identical bytes, so the algorithm is
//! fixed per build with no in-band negotiation.

use xxhash_rust::xxh3::xxh3_128;

/// 128-bit chunk digest, kept as the two 64-bit halves that travel on the
/// wire (low, then high).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHash {
    pub low: u64,
    pub high: u64,
}

/// Hash a chunk payload.
pub fn hash128(data: &[u8]) -> ChunkHash {
    ChunkHash::from_u128(xxh3_128(data))
}

impl ChunkHash {
    pub fn from_u128(value: u128) -> Self {
        Self {
            low: value as u64,
            high: (value >> 64) as u64,
        }
    }

    pub fn from_halves(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    /// An all-zero hash never leaves a well-behaved sender; the receiver
    /// treats one as corruption.
    pub fn is_zero(&self) -> bool {
        self.low == 0 && self.high == 0
    }
}

impl std::fmt::Display for ChunkHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}{:016x}", self.high, self.low)
    }
}
