//! Resource creation and chunked range writes.

use super::options::{header_flag, UploadFromOptions, UploadFromResult};
use super::sink::storage_fault;
use super::TransferClient;
use crate::context::Context;
use crate::fault::Fault;
use crate::message::{Body, Response, CONTENT_LENGTH_HEADER, SERVER_ENCRYPTED_HEADER};
use crate::range::HttpRange;
use crate::scheduler;
use crate::storage::FileSource;
use http::header::RANGE;
use http::Method;
use std::path::Path;
use std::sync::Arc;

impl TransferClient {
    /// Creates (or truncates) the remote resource with `size` bytes of zeros.
    pub fn create(&self, size: u64, ctx: &Context) -> Result<Response, Fault> {
        let mut req = self.request(Method::PUT);
        req.set_header(CONTENT_LENGTH_HEADER, &size.to_string())?;
        self.pipeline.send(req, ctx)?.error_for_status()
    }

    /// Writes `body` at `offset` of an existing resource.
    pub fn upload_range(&self, offset: u64, body: Body, ctx: &Context) -> Result<Response, Fault> {
        let range = HttpRange::new(offset, Some(body.len()));
        range.validate()?;
        let mut req = self.request(Method::PUT).with_body(body);
        req.set_header(RANGE, &range.to_string())?;
        self.pipeline.send(req, ctx)?.error_for_status()
    }

    /// Creates the resource and uploads `data` in parallel range writes.
    pub fn upload_from_buffer(
        &self,
        data: &[u8],
        options: &UploadFromOptions,
        ctx: &Context,
    ) -> Result<UploadFromResult, Fault> {
        options.validate()?;
        let shared: Arc<[u8]> = Arc::from(data);
        self.upload_chunks(data.len() as u64, options, ctx, |offset, length| {
            Body::slice(Arc::clone(&shared), offset as usize, length as usize)
        })
    }

    /// Creates the resource and uploads the file at `path` in parallel range writes.
    pub fn upload_from_file(
        &self,
        path: &Path,
        options: &UploadFromOptions,
        ctx: &Context,
    ) -> Result<UploadFromResult, Fault> {
        options.validate()?;
        let source = FileSource::open(path).map_err(storage_fault)?;
        let file = Arc::clone(source.file());
        self.upload_chunks(source.len(), options, ctx, |offset, length| {
            Ok(Body::file_range(Arc::clone(&file), offset, length))
        })
    }

    fn upload_chunks<B>(
        &self,
        size: u64,
        options: &UploadFromOptions,
        ctx: &Context,
        body_for: B,
    ) -> Result<UploadFromResult, Fault>
    where
        B: Fn(u64, u64) -> Result<Body, Fault> + Sync,
    {
        let created = self.create(size, ctx)?;
        let server_encrypted = header_flag(&created, SERVER_ENCRYPTED_HEADER);
        let created_etag = created.etag().map(str::to_string);
        drop(created);
        tracing::debug!(size, chunk_size = options.chunk_size, concurrency = options.concurrency, "resource created");

        let outcome = scheduler::run(ctx, 0, size, options.chunk_size, options.concurrency, |ctx, chunk, _| {
            let body = body_for(chunk.offset, chunk.length)?;
            let resp = self.upload_range(chunk.offset, body, ctx)?;
            Ok(resp.etag().map(str::to_string))
        })?;

        Ok(UploadFromResult {
            server_encrypted,
            etag: outcome.last.flatten().or(created_etag),
        })
    }
}
