//! Put command: chunked upload of a local file.

use super::{client_for, effective_config};
use crate::cli::TransferArgs;
use anyhow::Result;
use std::path::Path;
use std::time::Instant;
use xfer_core::config::XferConfig;
use xfer_core::Context;

pub fn run_put(cfg: &XferConfig, path: &Path, url: &str, args: &TransferArgs) -> Result<()> {
    let cfg = effective_config(cfg, args);
    let client = client_for(&cfg, url)?;
    let opts = cfg.upload_options();

    let started = Instant::now();
    let result = client.upload_from_file(path, &opts, &Context::new())?;
    let secs = started.elapsed().as_secs_f64();
    tracing::info!(url = %client.url(), path = %path.display(), secs, "upload complete");
    println!(
        "{} -> {} in {:.2}s{}",
        path.display(),
        client.url(),
        secs,
        result.etag.as_deref().map(|e| format!(" (ETag {})", e)).unwrap_or_default()
    );
    Ok(())
}
