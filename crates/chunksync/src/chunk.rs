//! The unit of transfer handed from the reader to the worker.

use bytes::Bytes;
use chunksync_core::ChunkHash;

/// One contiguous byte range of the file.
///
/// Created by the reader, owned by the queue while enqueued, released by the
/// worker after the per-chunk dialogue. Numbers start at 1 and are contiguous
/// within a session.
pub struct Chunk {
    pub num: i64,
    /// Byte length of the range. Kept separately because the receiver's
    /// reader drops `data` right after hashing.
    pub size: u64,
    /// XXH3-128 of the range's bytes.
    pub hash: ChunkHash,
    /// The raw bytes. Empty in receiver mode.
    pub data: Bytes,
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("num", &self.num)
            .field("size", &self.size)
            .field("hash", &format_args!("{}", self.hash))
            .field("data_len", &self.data.len())
            .finish()
    }
}
