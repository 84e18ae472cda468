//! Get command: chunked download to a file.

use super::{client_for, effective_config};
use crate::cli::TransferArgs;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;
use url::Url;
use xfer_core::checksum;
use xfer_core::config::XferConfig;
use xfer_core::Context;

/// Output file name taken from the last non-empty URL path segment.
pub(crate) fn default_output(url: &str) -> PathBuf {
    let name = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.rfind(|seg| !seg.is_empty()).map(str::to_string))
        })
        .unwrap_or_else(|| "download.bin".to_string());
    PathBuf::from(name)
}

pub fn run_get(
    cfg: &XferConfig,
    url: &str,
    output: Option<&str>,
    offset: u64,
    length: Option<u64>,
    sha256: Option<&str>,
    args: &TransferArgs,
) -> Result<()> {
    let cfg = effective_config(cfg, args);
    let client = client_for(&cfg, url)?;
    let path = output.map(PathBuf::from).unwrap_or_else(|| default_output(url));
    let mut opts = cfg.download_options();
    opts.offset = offset;
    opts.length = length;

    let started = Instant::now();
    let result = client.download_to_file(&path, &opts, &Context::new())?;
    let secs = started.elapsed().as_secs_f64();
    tracing::info!(
        url = %client.url(),
        path = %path.display(),
        bytes = result.content_length,
        secs,
        "download complete"
    );
    println!(
        "{}: {} bytes in {:.2}s{}",
        path.display(),
        result.content_length,
        secs,
        result.etag.as_deref().map(|e| format!(" (ETag {})", e)).unwrap_or_default()
    );

    if let Some(expected) = sha256 {
        checksum::verify_sha256(Path::new(&path), expected)?;
        println!("sha256 OK");
    }
    Ok(())
}
