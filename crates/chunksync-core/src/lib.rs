//! chunksync-core — wire format, content hash, and configuration.
//! Everything the sender and receiver must agree on byte-for-byte.

pub mod config;
pub mod hash;
pub mod wire;

pub use hash::ChunkHash;
