//! Chunk reader — streams the local file into the bounded queue.
//!
//! Runs as its own task in both roles. Chunks are numbered from 1 and pushed
//! in order; the bounded queue blocks the reader whenever the worker falls
//! behind by the configured capacity. A short read is fatal because the
//! receiver's offset arithmetic depends on contiguous chunk sizes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::time::Instant;

use chunksync_core::hash;

use crate::chunk::Chunk;
use crate::progress::Progress;

/// Session totals, returned when the reader has consumed the whole file.
#[derive(Debug, Clone, Copy)]
pub struct ReadStats {
    pub chunks: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl ReadStats {
    pub fn throughput_mb_s(&self) -> f64 {
        self.bytes as f64 / self.elapsed.as_secs_f64().max(1e-6) / (1024.0 * 1024.0)
    }
}

pub struct ChunkReader {
    path: PathBuf,
    /// Total bytes to stream, determined once by the role before the
    /// preamble. The reader reads exactly this many bytes.
    filesize: u64,
    chunk_size: u64,
    /// Receiver mode drops the payload right after hashing; only the
    /// sender keeps bytes around for upload.
    keep_data: bool,
    queue: mpsc::Sender<Chunk>,
    progress: Arc<Progress>,
}

impl ChunkReader {
    pub fn new(
        path: PathBuf,
        filesize: u64,
        chunk_size: u64,
        keep_data: bool,
        queue: mpsc::Sender<Chunk>,
        progress: Arc<Progress>,
    ) -> Self {
        Self {
            path,
            filesize,
            chunk_size,
            keep_data,
            queue,
            progress,
        }
    }

    pub async fn run(self) -> Result<ReadStats> {
        let mut file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), filesize = self.filesize, "reader started");

        let started = Instant::now();
        let mut remaining = self.filesize;
        let mut num: i64 = 0;

        while remaining > 0 {
            let size = remaining.min(self.chunk_size);
            num += 1;

            let mut buf = vec![0u8; size as usize];
            let read_started = Instant::now();
            file.read_exact(&mut buf).await.with_context(|| {
                format!("short read: chunk {num} wanted {size} bytes of {}", self.path.display())
            })?;
            let read_elapsed = read_started.elapsed();

            let hash = hash::hash128(&buf);
            self.progress.add_bytes(size);
            tracing::debug!(
                num,
                size,
                %hash,
                read_mb_s = format_args!(
                    "{:.2}",
                    size as f64 / read_elapsed.as_secs_f64().max(1e-6) / (1024.0 * 1024.0)
                ),
                "chunk read"
            );

            let data = if self.keep_data {
                Bytes::from(buf)
            } else {
                Bytes::new()
            };

            if self.queue.send(Chunk { num, size, hash, data }).await.is_err() {
                bail!("chunk queue consumer dropped at chunk {num}");
            }
            remaining -= size;
        }

        self.progress.finish();
        let stats = ReadStats {
            chunks: num as u64,
            bytes: self.filesize,
            elapsed: started.elapsed(),
        };
        tracing::debug!(chunks = stats.chunks, bytes = stats.bytes, "reader finished");
        Ok(stats)
    }
}
