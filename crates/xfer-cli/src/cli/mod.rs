//! CLI for the xfer transfer engine.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::Path;
use xfer_core::config;

use commands::{run_checksum, run_get, run_put};

/// Top-level CLI for xfer.
#[derive(Debug, Parser)]
#[command(name = "xfer")]
#[command(about = "xfer: chunked, resumable HTTP transfers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Overrides for the `[transfer]` and `[retry]` config sections.
#[derive(Debug, Clone, Default, Args)]
pub struct TransferArgs {
    /// Bytes per chunk request.
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<u64>,

    /// Size of the first (probing) download request.
    #[arg(long, value_name = "BYTES")]
    pub initial_chunk_size: Option<u64>,

    /// Parallel chunk requests.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Host to fail reads over to (host or host:port).
    #[arg(long, value_name = "HOST")]
    pub secondary_host: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a resource to a local file in parallel ranges.
    Get {
        /// HTTP/HTTPS URL of the resource.
        url: String,

        /// Output path (default: last URL path segment).
        #[arg(short, long, value_name = "PATH")]
        output: Option<String>,

        /// First byte to fetch.
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Bytes to fetch (default: to the end).
        #[arg(long)]
        length: Option<u64>,

        /// Verify the finished file against this SHA-256.
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,

        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Upload a local file as a new resource in parallel range writes.
    Put {
        /// Path to the local file.
        path: String,

        /// HTTP/HTTPS URL of the resource to create.
        url: String,

        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                output,
                offset,
                length,
                sha256,
                transfer,
            } => run_get(&cfg, &url, output.as_deref(), offset, length, sha256.as_deref(), &transfer)?,
            CliCommand::Put { path, url, transfer } => run_put(&cfg, Path::new(&path), &url, &transfer)?,
            CliCommand::Checksum { path } => run_checksum(Path::new(&path))?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
