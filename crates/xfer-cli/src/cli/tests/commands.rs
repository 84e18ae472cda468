use crate::cli::commands::{default_output, effective_config};
use crate::cli::TransferArgs;
use std::path::PathBuf;
use xfer_core::config::XferConfig;

#[test]
fn default_output_uses_last_segment() {
    assert_eq!(default_output("https://example.com/a/b/disk.img"), PathBuf::from("disk.img"));
    assert_eq!(default_output("https://example.com/a/dir/"), PathBuf::from("dir"));
    assert_eq!(default_output("https://example.com/"), PathBuf::from("download.bin"));
}

#[test]
fn overrides_replace_config_values() {
    let cfg = XferConfig::default();
    let args = TransferArgs {
        chunk_size: Some(65_536),
        initial_chunk_size: Some(8192),
        concurrency: Some(3),
        secondary_host: Some("replica.example.com".to_string()),
    };
    let eff = effective_config(&cfg, &args);
    assert_eq!(eff.download_options().chunk_size, Some(65_536));
    assert_eq!(eff.download_options().initial_chunk_size, 8192);
    assert_eq!(eff.upload_options().concurrency, 3);
    assert_eq!(eff.retry_options().secondary_host.as_deref(), Some("replica.example.com"));
    assert_eq!(effective_config(&cfg, &TransferArgs::default()), cfg);
}
