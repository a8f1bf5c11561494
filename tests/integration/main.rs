//! chunksync integration test harness.
//!
//! Tests spawn the real binary in both roles over loopback TCP:
//!
//!   cargo build
//!   cargo test --test integration
//!
//! Each test takes its own port and scratch directory, so tests run in
//! parallel without conflicts. Tests skip themselves when the binary has
//! not been built yet.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

mod failures;
mod sync;

// ── Binary paths ──────────────────────────────────────────────────────────────

pub fn chunksync_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("target/debug/chunksync")
}

pub fn binary_available() -> bool {
    chunksync_path().exists()
}

// ── Per-test resources ────────────────────────────────────────────────────────

/// Each test takes a distinct port so sessions never cross.
pub fn next_port() -> u16 {
    static NEXT: AtomicU16 = AtomicU16::new(21760);
    NEXT.fetch_add(1, Ordering::SeqCst)
}

pub fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "chunksync-it-{}-{}",
        name,
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn patterned(len: usize, salt: u8) -> Vec<u8> {
    (0..len).map(|i| (i % 247) as u8 ^ salt).collect()
}

// ── Process helpers ───────────────────────────────────────────────────────────

fn base_command(file: &Path, port: u16, chunk_size: u64) -> Command {
    let mut cmd = Command::new(chunksync_path());
    cmd.arg("--file")
        .arg(file)
        .args(["--ip", "127.0.0.1"])
        .args(["--port", &port.to_string()])
        .args(["--chunk-size", &chunk_size.to_string()])
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

pub fn spawn_server(file: &Path, port: u16, chunk_size: u64) -> Child {
    let mut cmd = base_command(file, port, chunk_size);
    cmd.arg("--server");
    cmd.spawn().expect("failed to spawn chunksync server")
}

pub fn run_client(file: &Path, port: u16, chunk_size: u64) -> Output {
    base_command(file, port, chunk_size)
        .output()
        .expect("failed to run chunksync client")
}

/// Run the client, retrying while the server side is still binding.
pub fn run_client_ready(file: &Path, port: u16, chunk_size: u64) -> Output {
    for _ in 0..25 {
        let output = run_client(file, port, chunk_size);
        if output.status.success() || !stderr_of(&output).contains("failed to connect") {
            return output;
        }
        thread::sleep(Duration::from_millis(200));
    }
    panic!("server on port {port} never became reachable");
}

/// Wait for a spawned server to exit on its own; kill it if it does not.
pub fn wait_server(mut child: Child, timeout: Duration) -> Result<Output> {
    let started = Instant::now();
    loop {
        if child.try_wait().context("try_wait failed")?.is_some() {
            return child.wait_with_output().context("wait_with_output failed");
        }
        if started.elapsed() > timeout {
            child.kill().ok();
            let output = child.wait_with_output().context("wait_with_output failed")?;
            bail!(
                "server did not exit within {timeout:?}; stderr:\n{}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        thread::sleep(Duration::from_millis(100));
    }
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
