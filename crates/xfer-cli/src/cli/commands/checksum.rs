//! Checksum command: compute SHA-256 of a file.

use anyhow::Result;
use std::path::Path;
use xfer_core::checksum;

/// Compute and print SHA-256 of the given file.
pub fn run_checksum(path: &Path) -> Result<()> {
    let digest = checksum::sha256_path(path)?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
