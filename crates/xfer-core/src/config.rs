//! `~/.config/xfer/config.toml`: retry and transfer defaults.

use crate::client::{DownloadToOptions, UploadFromOptions};
use crate::reliable::ReliableStreamOptions;
use crate::retry::RetryOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction in `[0, 1]`.
    pub jitter: f64,
    pub retryable_status_codes: Vec<u16>,
    /// Host (optionally `host:port`) used for read retries.
    pub secondary_host: Option<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let o = RetryOptions::default();
        Self {
            max_attempts: o.max_attempts,
            base_delay_ms: o.base_delay.as_millis() as u64,
            max_delay_ms: o.max_delay.as_millis() as u64,
            jitter: o.jitter,
            retryable_status_codes: o.retryable_status_codes.into_iter().collect(),
            secondary_host: None,
        }
    }
}

/// `[transfer]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes per chunk; unset means derived per download and 4 MiB for uploads.
    pub chunk_size: Option<u64>,
    pub initial_chunk_size: u64,
    pub concurrency: usize,
    /// Resume requests allowed per download body.
    pub max_retry_requests: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        let d = DownloadToOptions::default();
        Self {
            chunk_size: None,
            initial_chunk_size: d.initial_chunk_size,
            concurrency: d.concurrency,
            max_retry_requests: d.reliable.max_retry_requests,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XferConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

impl XferConfig {
    pub fn retry_options(&self) -> RetryOptions {
        RetryOptions {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            jitter: self.retry.jitter,
            retryable_status_codes: self.retry.retryable_status_codes.iter().copied().collect(),
            secondary_host: self.retry.secondary_host.clone(),
            ..RetryOptions::default()
        }
    }

    pub fn download_options(&self) -> DownloadToOptions {
        DownloadToOptions {
            initial_chunk_size: self.transfer.initial_chunk_size,
            chunk_size: self.transfer.chunk_size,
            concurrency: self.transfer.concurrency,
            reliable: ReliableStreamOptions {
                max_retry_requests: self.transfer.max_retry_requests,
            },
            ..DownloadToOptions::default()
        }
    }

    pub fn upload_options(&self) -> UploadFromOptions {
        let defaults = UploadFromOptions::default();
        UploadFromOptions {
            chunk_size: self.transfer.chunk_size.unwrap_or(defaults.chunk_size),
            concurrency: self.transfer.concurrency,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("xfer")?;
    Ok(dirs.place_config_file("config.toml")?)
}

/// Parse the file at `path`.
pub fn load_from(path: &Path) -> Result<XferConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: XferConfig = toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    cfg.retry_options()
        .validate()
        .with_context(|| format!("invalid [retry] in {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration, writing a default file first if none exists.
pub fn load_or_init() -> Result<XferConfig> {
    let path = config_path()?;
    if !path.exists() {
        let cfg = XferConfig::default();
        let text = toml::to_string_pretty(&cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, text)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(cfg);
    }
    load_from(&path)
}
