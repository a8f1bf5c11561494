//! Cross-role rendezvous — pairs the receiver's local chunk metadata with the
//! inbound network dialogue.
//!
//! The receiver has two producers of per-chunk state: its own reader (the
//! local chunk's number and hash at position k) and the network (the sender's
//! chunk k). A pair of capacity-1 channels forms a strict ping-pong: the
//! worker publishes `(num, hash)` and blocks until the handler reports the
//! chunk's dialogue finished, so each chunk advances both sides exactly once.

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;

use chunksync_core::ChunkHash;

/// Identity of the chunk the receiver's reader is currently offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkMeta {
    pub num: i64,
    pub hash: ChunkHash,
}

/// Worker half. Dropping it tells the handler no further local chunks exist.
pub struct WorkerSide {
    meta_tx: mpsc::Sender<ChunkMeta>,
    done_rx: mpsc::Receiver<()>,
}

/// Network-handler half.
pub struct HandlerSide {
    meta_rx: mpsc::Receiver<ChunkMeta>,
    done_tx: mpsc::Sender<()>,
}

pub fn pair() -> (WorkerSide, HandlerSide) {
    let (meta_tx, meta_rx) = mpsc::channel(1);
    let (done_tx, done_rx) = mpsc::channel(1);
    (
        WorkerSide { meta_tx, done_rx },
        HandlerSide { meta_rx, done_tx },
    )
}

impl WorkerSide {
    /// Publish the next local chunk and wait until the network handler has
    /// finished the full dialogue for it.
    pub async fn offer(&mut self, meta: ChunkMeta) -> Result<()> {
        self.meta_tx
            .send(meta)
            .await
            .map_err(|_| anyhow!("network handler gone, cannot offer chunk {}", meta.num))?;
        self.done_rx
            .recv()
            .await
            .ok_or_else(|| anyhow!("network handler gone before completing chunk {}", meta.num))?;
        Ok(())
    }
}

impl HandlerSide {
    /// The chunk the local reader expects next. `None` once the reader has
    /// delivered every chunk of the file.
    pub async fn next_expected(&mut self) -> Option<ChunkMeta> {
        self.meta_rx.recv().await
    }

    /// Release the worker for the next chunk. Called after the final per-chunk
    /// ACK has been written.
    pub async fn complete(&mut self) -> Result<()> {
        self.done_tx
            .send(())
            .await
            .map_err(|_| anyhow!("worker gone before chunk completion"))
    }
}
