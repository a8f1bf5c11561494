//! Sender worker (client role) — drives the per-chunk dialogue over one TCP
//! connection and uploads only the chunks the receiver does not already have.
//!
//! For each chunk: offer `num + size + hash`, read the receiver's verdict
//! (`EQL` skip, `ACK` upload, `NOK` abort), then wait for the second `ACK`
//! confirming the receiver committed its file write. The second ACK bounds
//! divergence between sender progress and receiver durability to one chunk.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use zerocopy::AsBytes;

use chunksync_core::config::TransferConfig;
use chunksync_core::wire::{self, ChunkHeader, Preamble, ProtocolError, Response};

use crate::chunk::Chunk;
use crate::progress::{self, Progress};
use crate::reader::{ChunkReader, ReadStats};

/// Per-session sender totals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SendStats {
    /// Chunks that completed the full dialogue.
    pub chunks: u64,
    /// Chunks whose payload was uploaded (receiver answered ACK).
    pub uploaded: u64,
    /// Chunks skipped because the hashes matched (receiver answered EQL).
    pub skipped: u64,
    /// Payload bytes actually moved.
    pub payload_bytes: u64,
}

/// Run a whole sender session: reader + status task + dialogue + sentinel.
pub async fn run(path: &Path, addr: SocketAddr, transfer: &TransferConfig) -> Result<SendStats> {
    let filesize = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();

    let progress = Arc::new(Progress::new(filesize));
    let (tx, mut rx) = mpsc::channel(transfer.queue_capacity);
    let reader = ChunkReader::new(
        path.to_path_buf(),
        filesize,
        transfer.chunk_size,
        true,
        tx,
        progress.clone(),
    );
    let reader_handle = tokio::spawn(reader.run());
    let status_handle = tokio::spawn(progress::report_loop(progress.clone()));

    let started = Instant::now();
    let result = drive_session(addr, filesize, &mut rx, reader_handle).await;

    // Unblock the status loop on every exit path before joining it.
    progress.finish();
    let _ = status_handle.await;

    let (stats, read_stats) = result?;
    tracing::info!(
        chunks = stats.chunks,
        uploaded = stats.uploaded,
        skipped = stats.skipped,
        payload_bytes = stats.payload_bytes,
        read_mb_s = format_args!("{:.2}", read_stats.throughput_mb_s()),
        elapsed_s = started.elapsed().as_secs(),
        "session complete"
    );
    Ok(stats)
}

async fn drive_session(
    addr: SocketAddr,
    filesize: u64,
    rx: &mut mpsc::Receiver<Chunk>,
    reader_handle: JoinHandle<Result<ReadStats>>,
) -> Result<(SendStats, ReadStats)> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    tracing::info!(%addr, filesize, "connected");

    let preamble = Preamble::new(filesize);
    stream
        .write_all(preamble.as_bytes())
        .await
        .context("failed to send preamble")?;
    tracing::debug!(
        version = %wire::version_label(&preamble.version),
        filesize,
        "sent preamble"
    );

    let mut stats = SendStats::default();
    while let Some(chunk) = rx.recv().await {
        sync_chunk(&mut stream, &chunk, &mut stats).await?;
    }

    // The queue is drained and the reader has exited. Surface a reader
    // failure here instead of signaling a clean end of stream.
    let read_stats = reader_handle.await.context("reader task panicked")??;

    stream
        .write_all(&wire::STREAM_END.to_le_bytes())
        .await
        .context("failed to send end-of-stream sentinel")?;
    tracing::debug!("sent end-of-stream sentinel");

    Ok((stats, read_stats))
}

async fn sync_chunk(stream: &mut TcpStream, chunk: &Chunk, stats: &mut SendStats) -> Result<()> {
    stream
        .write_all(&chunk.num.to_le_bytes())
        .await
        .with_context(|| format!("failed to send number of chunk {}", chunk.num))?;

    let header = ChunkHeader::new(chunk.size, chunk.hash);
    stream
        .write_all(header.as_bytes())
        .await
        .with_context(|| format!("failed to send header of chunk {}", chunk.num))?;
    tracing::debug!(num = chunk.num, size = chunk.size, hash = %chunk.hash, "offered chunk");

    match read_response(stream).await? {
        Response::Nok => return Err(ProtocolError::Rejected.into()),
        Response::Eql => {
            tracing::debug!(num = chunk.num, "hashes equal, payload skipped");
            stats.skipped += 1;
        }
        Response::Ack => {
            let upload_started = Instant::now();
            stream
                .write_all(&chunk.data)
                .await
                .with_context(|| format!("failed to send payload of chunk {}", chunk.num))?;
            tracing::debug!(
                num = chunk.num,
                bytes = chunk.size,
                upload_mb_s = format_args!(
                    "{:.2}",
                    chunk.size as f64
                        / upload_started.elapsed().as_secs_f64().max(1e-6)
                        / (1024.0 * 1024.0)
                ),
                "payload uploaded"
            );
            stats.uploaded += 1;
            stats.payload_bytes += chunk.size;
        }
    }

    match read_response(stream).await? {
        Response::Ack => {}
        other => bail!(
            "protocol error: expected ACK completing chunk {}, got {:?}",
            chunk.num,
            other
        ),
    }
    stats.chunks += 1;
    Ok(())
}

async fn read_response(stream: &mut TcpStream) -> Result<Response> {
    let mut token = [0u8; wire::RESPONSE_LENGTH];
    stream
        .read_exact(&mut token)
        .await
        .context("failed to read response token")?;
    Ok(Response::from_wire(token)?)
}
