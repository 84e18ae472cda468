//! Options and results for client operations.

use crate::fault::Fault;
use crate::message::{Response, SERVER_ENCRYPTED_HEADER};
use crate::range::{ContentRange, HttpRange};
use crate::reliable::ReliableStreamOptions;
use http::header::LAST_MODIFIED;
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::io::Read;

pub const MIB: u64 = 1024 * 1024;
/// First probing request of `download_to_*`.
pub const DEFAULT_INITIAL_CHUNK_SIZE: u64 = 4 * MIB;
/// Cap for the derived download chunk size.
pub const MAX_DOWNLOAD_CHUNK_SIZE: u64 = 4 * MIB;
/// Derived download chunk sizes are rounded up to this grain.
pub const CHUNK_GRAIN: u64 = 4 * 1024;
pub const DEFAULT_UPLOAD_CHUNK_SIZE: u64 = 4 * MIB;
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Options for a single streamed `download`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Sub-range to fetch; `None` means the whole resource.
    pub range: Option<HttpRange>,
    pub reliable: ReliableStreamOptions,
}

/// Options for chunked `download_to_buffer` / `download_to_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadToOptions {
    pub offset: u64,
    /// Bytes to fetch from `offset`; `None` reads to the end of the resource.
    pub length: Option<u64>,
    pub initial_chunk_size: u64,
    /// Chunk size after the first request; derived from the remaining size when `None`.
    pub chunk_size: Option<u64>,
    pub concurrency: usize,
    pub reliable: ReliableStreamOptions,
}

impl Default for DownloadToOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            length: None,
            initial_chunk_size: DEFAULT_INITIAL_CHUNK_SIZE,
            chunk_size: None,
            concurrency: DEFAULT_CONCURRENCY,
            reliable: ReliableStreamOptions::default(),
        }
    }
}

impl DownloadToOptions {
    pub fn validate(&self) -> Result<(), Fault> {
        if self.initial_chunk_size == 0 {
            return Err(Fault::config("initial chunk size must be greater than zero"));
        }
        if self.chunk_size == Some(0) {
            return Err(Fault::config("chunk size must be greater than zero"));
        }
        if self.concurrency == 0 {
            return Err(Fault::config("concurrency must be at least 1"));
        }
        HttpRange::new(self.offset, self.length).validate()
    }

    /// Explicit chunk size, or `remaining / concurrency` rounded up to
    /// `CHUNK_GRAIN` and capped at `MAX_DOWNLOAD_CHUNK_SIZE`.
    pub fn chunk_size_for(&self, remaining: u64) -> u64 {
        if let Some(size) = self.chunk_size {
            return size;
        }
        let per_worker = remaining.div_ceil(self.concurrency.max(1) as u64);
        let rounded = per_worker.div_ceil(CHUNK_GRAIN).max(1) * CHUNK_GRAIN;
        rounded.min(MAX_DOWNLOAD_CHUNK_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadFromOptions {
    pub chunk_size: u64,
    pub concurrency: usize,
}

impl Default for UploadFromOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl UploadFromOptions {
    pub fn validate(&self) -> Result<(), Fault> {
        if self.chunk_size == 0 {
            return Err(Fault::config("chunk size must be greater than zero"));
        }
        if self.concurrency == 0 {
            return Err(Fault::config("concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// Metadata of one download response.
#[derive(Debug, Clone, Default)]
pub struct DownloadProperties {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_length: Option<u64>,
    pub content_range: Option<ContentRange>,
    pub server_encrypted: bool,
    pub headers: HeaderMap,
}

pub(crate) fn header_flag(resp: &Response, name: &str) -> bool {
    resp.header_str(name).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

impl DownloadProperties {
    pub(crate) fn from_response(resp: &Response) -> Self {
        Self {
            etag: resp.etag().map(str::to_string),
            last_modified: resp.header_str(LAST_MODIFIED.as_str()).map(str::to_string),
            content_length: resp.content_length(),
            content_range: resp.content_range(),
            server_encrypted: header_flag(resp, SERVER_ENCRYPTED_HEADER),
            headers: resp.headers().clone(),
        }
    }
}

/// Streamed download; `body` resumes transparently after transport faults.
pub struct DownloadResponse {
    pub status: StatusCode,
    pub properties: DownloadProperties,
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadResponse")
            .field("status", &self.status)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// Result of `download_to_buffer` / `download_to_file`.
#[derive(Debug, Clone, Default)]
pub struct DownloadToResult {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Bytes written to the target (the size of the downloaded range).
    pub content_length: u64,
    /// Whole-resource size, when the service reported it.
    pub resource_size: Option<u64>,
    pub server_encrypted: bool,
    /// Headers of the response that carried the last chunk.
    pub headers: HeaderMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadFromResult {
    pub server_encrypted: bool,
    pub etag: Option<String>,
}
