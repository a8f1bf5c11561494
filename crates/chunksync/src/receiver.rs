//! Receiver worker (server role) — accepts one inbound session and mutates
//! the local file in place at chunk offsets.
//!
//! The receiver runs its own reader over the local file and pairs each local
//! chunk's `(num, hash)` with the sender's frame via the rendezvous. A chunk's
//! payload is requested only when the hashes differ; the write is committed
//! before the final per-chunk ACK, so the sender never runs more than one
//! chunk ahead of the receiver's file.

use std::io::SeekFrom;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use zerocopy::FromBytes;

use chunksync_core::config::TransferConfig;
use chunksync_core::wire::{self, ChunkHeader, Preamble, ProtocolError, Response};

use crate::chunk::Chunk;
use crate::progress::Progress;
use crate::reader::ChunkReader;
use crate::rendezvous::{self, ChunkMeta, HandlerSide, WorkerSide};

/// Per-session receiver totals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveStats {
    /// Chunks that completed the full dialogue.
    pub chunks: u64,
    /// Chunks whose payload was received and written in place.
    pub written: u64,
    /// Chunks skipped because the hashes matched.
    pub skipped: u64,
    /// Payload bytes received.
    pub payload_bytes: u64,
}

/// Bind the listener and serve exactly one session.
pub async fn run(path: &Path, addr: SocketAddr, transfer: &TransferConfig) -> Result<ReceiveStats> {
    tracing::warn!(
        path = %path.display(),
        "target file will be modified in place by the remote peer"
    );
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");
    serve(listener, path.to_path_buf(), transfer.clone()).await
}

/// Serve one session on an already-bound listener.
pub async fn serve(
    listener: TcpListener,
    path: PathBuf,
    transfer: TransferConfig,
) -> Result<ReceiveStats> {
    let filesize = tokio::fs::metadata(&path)
        .await
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();

    let progress = Arc::new(Progress::new(filesize));
    let (tx, rx) = mpsc::channel(transfer.queue_capacity);
    let reader = ChunkReader::new(
        path.clone(),
        filesize,
        transfer.chunk_size,
        false,
        tx,
        progress,
    );
    let reader_handle = tokio::spawn(reader.run());

    let (worker_side, handler_side) = rendezvous::pair();
    let worker_handle = tokio::spawn(offer_loop(rx, worker_side));

    let (stream, peer) = listener.accept().await.context("accept failed")?;
    tracing::info!(%peer, "peer connected");
    // Exactly one connection per session.
    drop(listener);

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .await
        .with_context(|| format!("failed to open {} for writing", path.display()))?;

    let started = Instant::now();
    match handle_connection(stream, file, filesize, transfer.chunk_size, handler_side).await {
        Ok(stats) => {
            let read_stats = reader_handle.await.context("reader task panicked")??;
            worker_handle.await.context("worker task panicked")??;
            tracing::info!(
                chunks = stats.chunks,
                written = stats.written,
                skipped = stats.skipped,
                payload_bytes = stats.payload_bytes,
                read_mb_s = format_args!("{:.2}", read_stats.throughput_mb_s()),
                elapsed_s = started.elapsed().as_secs(),
                "session complete"
            );
            Ok(stats)
        }
        Err(err) => {
            // When the local reader died first, its failure is the root cause.
            if reader_handle.is_finished() {
                if let Ok(Err(reader_err)) = reader_handle.await {
                    return Err(reader_err.context("local chunk reader failed"));
                }
            }
            Err(err)
        }
    }
}

/// Worker side of the rendezvous: hand each local chunk to the network
/// handler and wait for its dialogue to finish.
async fn offer_loop(mut rx: mpsc::Receiver<Chunk>, mut rendezvous: WorkerSide) -> Result<()> {
    while let Some(chunk) = rx.recv().await {
        rendezvous
            .offer(ChunkMeta {
                num: chunk.num,
                hash: chunk.hash,
            })
            .await?;
    }
    Ok(())
}

async fn handle_connection(
    mut stream: TcpStream,
    mut file: File,
    filesize: u64,
    chunk_size_max: u64,
    mut rendezvous: HandlerSide,
) -> Result<ReceiveStats> {
    let mut preamble_buf = [0u8; 40];
    stream
        .read_exact(&mut preamble_buf)
        .await
        .context("failed to read preamble")?;
    let preamble = Preamble::read_from(&preamble_buf[..]).context("malformed preamble")?;

    let peer_version = preamble.version;
    if peer_version != wire::version_field() {
        return Err(ProtocolError::VersionMismatch {
            peer: wire::version_label(&peer_version),
            local: wire::version_label(&wire::version_field()),
        }
        .into());
    }
    let remote_filesize = preamble.filesize.get();
    if remote_filesize != filesize {
        return Err(ProtocolError::FilesizeMismatch {
            peer: remote_filesize,
            local: filesize,
        }
        .into());
    }
    tracing::debug!(remote_filesize, "preamble accepted");

    let mut offset: u64 = 0;
    let mut stats = ReceiveStats::default();

    loop {
        let mut num_buf = [0u8; 8];
        stream
            .read_exact(&mut num_buf)
            .await
            .context("failed to read chunk number")?;
        let num = i64::from_le_bytes(num_buf);
        if num < 0 {
            tracing::debug!("received end-of-stream sentinel");
            break;
        }

        let expected = match rendezvous.next_expected().await {
            Some(meta) => meta,
            None => bail!("peer offered chunk {num} but the local file has no further chunks"),
        };
        if num != expected.num {
            return Err(ProtocolError::ChunkNumMismatch {
                received: num,
                expected: expected.num,
            }
            .into());
        }

        let mut header_buf = [0u8; 24];
        stream
            .read_exact(&mut header_buf)
            .await
            .with_context(|| format!("failed to read header of chunk {num}"))?;
        let header = ChunkHeader::read_from(&header_buf[..]).context("malformed chunk header")?;

        let size = header.size.get();
        if size == 0 || size > chunk_size_max {
            return Err(ProtocolError::SizeOutOfRange {
                size,
                max: chunk_size_max,
            }
            .into());
        }
        let peer_hash = header.hash();
        if peer_hash.is_zero() {
            return Err(ProtocolError::ZeroHash.into());
        }
        tracing::debug!(num, size, %peer_hash, local_hash = %expected.hash, "chunk offered");

        if peer_hash == expected.hash {
            stream
                .write_all(Response::Eql.as_wire())
                .await
                .with_context(|| format!("failed to send EQL for chunk {num}"))?;
            tracing::debug!(num, "hashes equal, payload skipped");
            stats.skipped += 1;
        } else {
            stream
                .write_all(Response::Ack.as_wire())
                .await
                .with_context(|| format!("failed to send ACK for chunk {num}"))?;

            let mut payload = vec![0u8; size as usize];
            stream
                .read_exact(&mut payload)
                .await
                .with_context(|| format!("failed to read payload of chunk {num}"))?;

            let write_started = Instant::now();
            file.seek(SeekFrom::Start(offset))
                .await
                .with_context(|| format!("failed to seek to offset {offset}"))?;
            file.write_all(&payload)
                .await
                .with_context(|| format!("failed to write chunk {num} at offset {offset}"))?;
            // The write must be committed before the final ACK releases the
            // sender for the next chunk.
            file.flush()
                .await
                .with_context(|| format!("failed to flush chunk {num}"))?;
            tracing::debug!(
                num,
                bytes = size,
                offset,
                write_mb_s = format_args!(
                    "{:.2}",
                    size as f64
                        / write_started.elapsed().as_secs_f64().max(1e-6)
                        / (1024.0 * 1024.0)
                ),
                "chunk written"
            );
            stats.written += 1;
            stats.payload_bytes += size;
        }

        offset += size;

        stream
            .write_all(Response::Ack.as_wire())
            .await
            .with_context(|| format!("failed to send final ACK for chunk {num}"))?;
        rendezvous.complete().await?;
        stats.chunks += 1;
    }

    if offset != filesize {
        return Err(ProtocolError::ShortSession { offset, filesize }.into());
    }
    Ok(stats)
}
