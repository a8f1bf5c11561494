//! Transfer progress — shared counters and the sender's status task.
//!
//! The reader is the only writer of the byte counter; the status task only
//! reads it and tolerates momentary staleness.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct Progress {
    filesize: u64,
    bytes_read: AtomicU64,
    finished: AtomicBool,
}

impl Progress {
    pub fn new(filesize: u64) -> Self {
        Self {
            filesize,
            bytes_read: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }
    }

    pub fn add_bytes(&self, n: u64) {
        self.bytes_read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    pub fn percent(&self) -> f64 {
        if self.filesize == 0 {
            return 100.0;
        }
        self.bytes_read() as f64 / self.filesize as f64 * 100.0
    }

    pub fn filesize(&self) -> u64 {
        self.filesize
    }
}

/// Once-per-second progress report, sender only. Exits when the reader has
/// consumed the whole file.
pub async fn report_loop(progress: Arc<Progress>) {
    let started = Instant::now();
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.tick().await;

    while !progress.is_finished() {
        interval.tick().await;

        let done = progress.bytes_read();
        let elapsed = started.elapsed();
        let rate = done as f64 / elapsed.as_secs_f64().max(1e-6);
        let remaining_bytes = progress.filesize().saturating_sub(done);
        let remaining_secs = if rate > 0.0 {
            (remaining_bytes as f64 / rate) as u64
        } else {
            0
        };

        tracing::info!(
            percent = format_args!("{:.2}", progress.percent()),
            elapsed = %format_mmss(elapsed.as_secs()),
            remaining = %format_mmss(remaining_secs),
            "progress"
        );
    }
}

fn format_mmss(total_secs: u64) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
