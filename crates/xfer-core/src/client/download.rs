//! Streamed and chunked downloads.

use super::options::{DownloadOptions, DownloadProperties, DownloadResponse, DownloadToOptions, DownloadToResult};
use super::sink::{BufferSink, FileSink, RangeSink};
use super::TransferClient;
use crate::context::Context;
use crate::fault::{Fault, TransportErrorKind};
use crate::message::Response;
use crate::range::HttpRange;
use crate::reliable::{ReliableStream, ReliableStreamOptions, ResumeDescriptor};
use crate::scheduler;
use http::header::RANGE;
use http::{Method, StatusCode};
use std::io::{self, Read};
use std::path::Path;

fn protocol_fault(message: impl Into<String>) -> Fault {
    Fault::transport(TransportErrorKind::Other, message)
}

/// A 206 must start exactly where it was asked to.
fn check_range_start(resp: &Response, offset: u64) -> Result<(), Fault> {
    match resp.content_range().and_then(|cr| cr.range) {
        Some((start, _)) if start == offset => Ok(()),
        Some((start, _)) => Err(protocol_fault(format!(
            "asked for bytes from {} but the service sent them from {}",
            offset, start
        ))),
        None => Err(protocol_fault(format!("206 at offset {} without a usable Content-Range", offset))),
    }
}

/// Discards the first `n` bytes of a full body.
fn skip_prefix(body: &mut dyn Read, n: u64) -> Result<(), Fault> {
    let skipped = io::copy(&mut body.take(n), &mut io::sink()).map_err(Fault::from)?;
    if skipped != n {
        return Err(protocol_fault("body ended before the requested offset"));
    }
    Ok(())
}

impl TransferClient {
    /// GET, optionally ranged; non-2xx becomes `Fault::Service`.
    fn get_range(&self, range: Option<HttpRange>, ctx: &Context) -> Result<Response, Fault> {
        let mut req = self.request(Method::GET);
        if let Some(r) = range {
            r.validate()?;
            req.set_header(RANGE, &r.to_string())?;
        }
        self.pipeline.send(req, ctx)?.error_for_status()
    }

    /// Re-requests the undelivered tail of a body that started at `start`.
    fn resume_range(&self, ctx: &Context, start: u64, d: &ResumeDescriptor) -> Result<Response, Fault> {
        let resp = self.get_range(Some(HttpRange::new(start + d.offset, d.remaining)), ctx)?;
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(protocol_fault(format!(
                "service answered a resume at {} with {}",
                start + d.offset,
                resp.status()
            )));
        }
        check_range_start(&resp, start + d.offset)?;
        Ok(resp)
    }

    fn reliable_body(
        &self,
        ctx: &Context,
        resp: Response,
        start: u64,
        options: ReliableStreamOptions,
    ) -> ReliableStream<impl FnMut(&Context, &ResumeDescriptor) -> Result<Response, Fault> + Send + 'static> {
        let client = self.clone();
        ReliableStream::new(ctx.clone(), resp, options, move |ctx, d| client.resume_range(ctx, start, d))
    }

    /// Starts a download and returns as soon as headers arrive. The body
    /// resumes after transport faults and fails with `Fault::Consistency` if
    /// the resource changes underneath it. If the service ignores the range,
    /// the body is still trimmed to the requested bytes.
    pub fn download(&self, options: &DownloadOptions, ctx: &Context) -> Result<DownloadResponse, Fault> {
        let resp = self.get_range(options.range, ctx)?;
        let status = resp.status();
        let properties = DownloadProperties::from_response(&resp);
        let body: Box<dyn Read + Send> = match (status, options.range) {
            (StatusCode::PARTIAL_CONTENT, Some(r)) => {
                check_range_start(&resp, r.offset)?;
                Box::new(self.reliable_body(ctx, resp, r.offset, options.reliable))
            }
            (_, Some(r)) => {
                tracing::debug!(range = %r, %status, "service ignored range, trimming full body");
                let mut body = self.reliable_body(ctx, resp, 0, options.reliable);
                skip_prefix(&mut body, r.offset)?;
                match r.length {
                    Some(len) => Box::new(body.take(len)),
                    None => Box::new(body),
                }
            }
            (_, None) => Box::new(self.reliable_body(ctx, resp, 0, options.reliable)),
        };
        Ok(DownloadResponse { status, properties, body })
    }

    /// Downloads `[offset, offset + length)` into `buf`. Fails with
    /// `Fault::Config` if the range does not fit.
    pub fn download_to_buffer(
        &self,
        buf: &mut [u8],
        options: &DownloadToOptions,
        ctx: &Context,
    ) -> Result<DownloadToResult, Fault> {
        let mut sink = BufferSink::new(buf);
        self.download_to_sink(&mut sink, options, ctx)
    }

    /// Downloads into `<path>.part`, then renames it to `path`. The temp
    /// file is removed on failure.
    pub fn download_to_file(&self, path: &Path, options: &DownloadToOptions, ctx: &Context) -> Result<DownloadToResult, Fault> {
        let mut sink = FileSink::new(path);
        match self.download_to_sink(&mut sink, options, ctx) {
            Ok(result) => {
                sink.finish()?;
                Ok(result)
            }
            Err(e) => {
                sink.discard();
                Err(e)
            }
        }
    }

    fn download_to_sink(
        &self,
        sink: &mut dyn RangeSink,
        options: &DownloadToOptions,
        ctx: &Context,
    ) -> Result<DownloadToResult, Fault> {
        options.validate()?;
        let first_len = options
            .length
            .map_or(options.initial_chunk_size, |l| l.min(options.initial_chunk_size));
        let first = match self.get_range(Some(HttpRange::new(options.offset, Some(first_len))), ctx) {
            Ok(resp) => resp,
            Err(Fault::Service { status, .. }) if status == StatusCode::RANGE_NOT_SATISFIABLE && options.offset == 0 => {
                // Empty resource: no byte range is satisfiable, fetch it whole.
                self.get_range(None, ctx)?
            }
            Err(e) => return Err(e),
        };
        if first.status() != StatusCode::PARTIAL_CONTENT {
            return self.download_whole(sink, first, options, ctx);
        }
        check_range_start(&first, options.offset)?;

        let first_props = DownloadProperties::from_response(&first);
        let content_range = first_props
            .content_range
            .ok_or_else(|| protocol_fault("206 response without Content-Range"))?;
        let end = match (options.length, content_range.total) {
            (Some(l), Some(total)) => (options.offset + l).min(total),
            (Some(l), None) => options.offset + l,
            (None, Some(total)) => total,
            (None, None) => return Err(protocol_fault("resource size unknown (Content-Range total is *)")),
        };
        let range_size = end.saturating_sub(options.offset);
        let first_chunk = first_len.min(range_size);
        tracing::debug!(
            offset = options.offset,
            range_size,
            resource_size = ?content_range.total,
            "first chunk received"
        );

        sink.prepare(range_size)?;
        let mut body = self.reliable_body(ctx, first, options.offset, options.reliable);
        sink.fill(0, first_chunk, &mut body)?;
        drop(body);

        let remaining = range_size - first_chunk;
        let chunk_size = options.chunk_size_for(remaining);
        let expected_etag = first_props.etag.clone();
        let sink: &dyn RangeSink = sink;
        let outcome = scheduler::run(
            ctx,
            options.offset + first_chunk,
            remaining,
            chunk_size,
            options.concurrency,
            |ctx, chunk, _total| {
                let resp = self.get_range(Some(chunk.range()), ctx)?;
                if resp.status() != StatusCode::PARTIAL_CONTENT {
                    return Err(protocol_fault(format!("service ignored range {}", chunk.range())));
                }
                check_range_start(&resp, chunk.offset)?;
                if resp.etag() != expected_etag.as_deref() {
                    return Err(Fault::Consistency {
                        expected: expected_etag.clone(),
                        actual: resp.etag().map(str::to_string),
                    });
                }
                let props = DownloadProperties::from_response(&resp);
                let mut body = self.reliable_body(ctx, resp, chunk.offset, options.reliable);
                sink.fill(chunk.offset - options.offset, chunk.length, &mut body)?;
                Ok(props)
            },
        )?;

        let last = outcome.last.unwrap_or(first_props);
        Ok(DownloadToResult {
            etag: last.etag,
            last_modified: last.last_modified,
            content_length: range_size,
            resource_size: content_range.total,
            server_encrypted: last.server_encrypted,
            headers: last.headers,
        })
    }

    /// The service ignored the range and sent the whole resource.
    fn download_whole(
        &self,
        sink: &mut dyn RangeSink,
        resp: Response,
        options: &DownloadToOptions,
        ctx: &Context,
    ) -> Result<DownloadToResult, Fault> {
        let props = DownloadProperties::from_response(&resp);
        let total = props
            .content_length
            .ok_or_else(|| protocol_fault("full response without Content-Length"))?;
        if options.offset > total || (options.offset == total && total > 0) {
            return Err(Fault::Service {
                status: StatusCode::RANGE_NOT_SATISFIABLE,
                error_code: None,
                request_id: None,
                message: format!("offset {} beyond resource size {}", options.offset, total),
            });
        }
        let end = options.length.map_or(total, |l| (options.offset + l).min(total));
        let range_size = end - options.offset;
        tracing::debug!(offset = options.offset, range_size, total, "service ignored range, reading whole body");

        sink.prepare(range_size)?;
        let mut body = self.reliable_body(ctx, resp, 0, options.reliable);
        skip_prefix(&mut body, options.offset)?;
        sink.fill(0, range_size, &mut body)?;

        Ok(DownloadToResult {
            etag: props.etag,
            last_modified: props.last_modified,
            content_length: range_size,
            resource_size: Some(total),
            server_encrypted: props.server_encrypted,
            headers: props.headers,
        })
    }
}
