//! CLI command handlers, one file per command.

mod checksum;
mod get;
mod put;

pub use checksum::run_checksum;
#[cfg(test)]
pub(crate) use get::default_output;
pub use get::run_get;
pub use put::run_put;

use super::TransferArgs;
use anyhow::{Context as _, Result};
use std::sync::Arc;
use url::Url;
use xfer_core::config::XferConfig;
use xfer_core::policy::StaticCredential;
use xfer_core::transport::{CurlTransport, Transport};
use xfer_core::{PipelineBuilder, TransferClient};

/// Bearer token sent with every request when set.
pub const TOKEN_ENV: &str = "XFER_BEARER_TOKEN";

/// Config with command-line overrides applied.
pub(crate) fn effective_config(cfg: &XferConfig, args: &TransferArgs) -> XferConfig {
    let mut cfg = cfg.clone();
    if let Some(size) = args.chunk_size {
        cfg.transfer.chunk_size = Some(size);
    }
    if let Some(size) = args.initial_chunk_size {
        cfg.transfer.initial_chunk_size = size;
    }
    if let Some(n) = args.concurrency {
        cfg.transfer.concurrency = n;
    }
    if let Some(host) = &args.secondary_host {
        cfg.retry.secondary_host = Some(host.clone());
    }
    cfg
}

pub(crate) fn client_for(cfg: &XferConfig, url: &str) -> Result<TransferClient> {
    let url = Url::parse(url).with_context(|| format!("invalid URL {}", url))?;
    let transport: Arc<dyn Transport> = Arc::new(CurlTransport::default());
    let mut builder = PipelineBuilder::new(transport)
        .component("cli", env!("CARGO_PKG_VERSION"))
        .retry(cfg.retry_options());
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            builder = builder.credential(Arc::new(StaticCredential::bearer(token.trim())));
        }
    }
    let pipeline = builder.build()?;
    Ok(TransferClient::new(Arc::new(pipeline), url))
}
