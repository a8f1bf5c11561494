//! chunksync — in-place file synchronization over TCP.
//!
//! One binary, two roles: the client streams its file's chunk hashes to the
//! server and uploads only the chunks that differ; the server mutates its
//! copy in place at the matching offsets. Both files must already have the
//! same length.

mod chunk;
mod progress;
mod reader;
mod receiver;
mod rendezvous;
mod sender;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use chunksync_core::config::SyncConfig;

#[derive(Parser, Debug)]
#[command(
    name = "chunksync",
    version,
    about = "Synchronize a large file between two hosts, transferring only differing chunks"
)]
struct Cli {
    /// Run in server mode (the file is altered in place by the client)
    #[arg(short, long)]
    server: bool,

    /// IP address to use
    #[arg(short, long, value_name = "IP")]
    ip: Option<String>,

    /// Port to use
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// File to use
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Chunk granularity in bytes; must match the peer's
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<u64>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        tracing::error!(error = format_args!("{err:#}"), "fatal");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = SyncConfig::load()?;
    if let Some(ip) = cli.ip {
        config.network.server_ip = ip;
    }
    if let Some(port) = cli.port {
        config.network.server_port = port;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.transfer.chunk_size = chunk_size;
    }
    config.validate()?;

    let addr: SocketAddr = format!(
        "{}:{}",
        config.network.server_ip, config.network.server_port
    )
    .parse()
    .with_context(|| {
        format!(
            "invalid server address {}:{}",
            config.network.server_ip, config.network.server_port
        )
    })?;

    tracing::debug!(
        %addr,
        file = %cli.file.display(),
        chunk_size = config.transfer.chunk_size,
        server = cli.server,
        "resolved configuration"
    );

    if cli.server {
        receiver::run(&cli.file, addr, &config.transfer).await?;
    } else {
        sender::run(&cli.file, addr, &config.transfer).await?;
    }
    Ok(())
}

/// RUST_LOG wins; otherwise the -v count picks the default level.
fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
