//! Configuration system for chunksync.
//!
//! Resolution order: CLI flags → environment variables → config file → defaults.
//! The CLI layer lives in the binary; this module covers the rest.
//!
//! Config file location:
//!   1. $CHUNKSYNC_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/chunksync/config.toml
//!   3. ~/.config/chunksync/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wire;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub network: NetworkConfig,
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the server binds and the client connects to.
    pub server_ip: String,
    pub server_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Chunk granularity in bytes. Both peers must use the same value or
    /// every chunk number check fails on the first frame.
    pub chunk_size: u64,
    /// Reader-to-worker queue depth.
    pub queue_capacity: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_ip: wire::DEFAULT_SERVER_IP.to_string(),
            server_port: wire::DEFAULT_SERVER_PORT,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: wire::CHUNK_SIZE_MAX,
            queue_capacity: wire::QUEUE_CAPACITY,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid chunk_size {0}: must be 1..={1}")]
    InvalidChunkSize(u64, u64),
    #[error("invalid queue_capacity 0: must be at least 1")]
    InvalidQueueCapacity,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SyncConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            SyncConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CHUNKSYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Reject values the transfer loops cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer.chunk_size == 0 || self.transfer.chunk_size > wire::CHUNK_SIZE_MAX {
            return Err(ConfigError::InvalidChunkSize(
                self.transfer.chunk_size,
                wire::CHUNK_SIZE_MAX,
            ));
        }
        if self.transfer.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        Ok(())
    }

    /// Apply CHUNKSYNC_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHUNKSYNC_NETWORK__SERVER_IP") {
            self.network.server_ip = v;
        }
        if let Ok(v) = std::env::var("CHUNKSYNC_NETWORK__SERVER_PORT") {
            if let Ok(p) = v.parse() {
                self.network.server_port = p;
            }
        }
        if let Ok(v) = std::env::var("CHUNKSYNC_TRANSFER__CHUNK_SIZE") {
            if let Ok(s) = v.parse() {
                self.transfer.chunk_size = s;
            }
        }
        if let Ok(v) = std::env::var("CHUNKSYNC_TRANSFER__QUEUE_CAPACITY") {
            if let Ok(c) = v.parse() {
                self.transfer.queue_capacity = c;
            }
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_or_tmp().join(".config"))
        .join("chunksync")
}

fn home_or_tmp() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
