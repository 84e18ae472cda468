//! Resumable download body.
//!
//! `ReliableStream` wraps the body of one download. When reading fails with a
//! transport fault it asks its resume callback for a fresh response covering
//! the bytes not yet delivered, checks that the ETag still matches the one
//! seen at the start, and carries on. The caller sees one uninterrupted byte
//! stream or a single terminal fault.

use crate::context::Context;
use crate::fault::{Fault, TransportErrorKind};
use crate::message::{Response, ResponseBody};
use std::fmt;
use std::io::{self, Read};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliableStreamOptions {
    /// Resume requests allowed over the life of the stream.
    pub max_retry_requests: u32,
}

impl Default for ReliableStreamOptions {
    fn default() -> Self {
        Self { max_retry_requests: 3 }
    }
}

/// What a resume request must fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeDescriptor {
    /// Bytes already delivered, relative to the start of the stream.
    pub offset: u64,
    /// ETag captured from the first response.
    pub etag: Option<String>,
    /// Bytes still owed, or `None` when reading to the end of the resource.
    pub remaining: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    /// A resume request is in flight after a transport fault.
    Resuming,
    Finished,
    /// Resume budget spent before the expected length arrived.
    Exhausted,
    /// Resource changed between the original and a resumed read.
    Inconsistent,
    /// Non-recoverable fault (service error, cancellation, ...).
    Failed,
}

pub struct ReliableStream<F> {
    ctx: Context,
    body: Option<ResponseBody>,
    resume: F,
    options: ReliableStreamOptions,
    etag: Option<String>,
    expected: Option<u64>,
    delivered: u64,
    retries: u32,
    state: StreamState,
    fault: Option<Fault>,
}

impl<F> ReliableStream<F>
where
    F: FnMut(&Context, &ResumeDescriptor) -> Result<Response, Fault> + Send,
{
    /// `initial` is the first (already successful) response; its ETag and
    /// length fix the identity and size every resume must honor. The length
    /// is `Content-Length`, or the span of `Content-Range` when the body is
    /// sent without one.
    pub fn new(ctx: Context, initial: Response, options: ReliableStreamOptions, resume: F) -> Self {
        let etag = initial.etag().map(str::to_string);
        let expected = initial.content_length().or_else(|| {
            initial
                .content_range()
                .filter(|cr| cr.range.is_some())
                .map(|cr| cr.len())
        });
        Self {
            ctx,
            body: Some(initial.into_body()),
            resume,
            options,
            etag,
            expected,
            delivered: 0,
            retries: 0,
            state: StreamState::Streaming,
            fault: None,
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn expected_len(&self) -> Option<u64> {
        self.expected
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    fn fail(&mut self, state: StreamState, fault: Fault) -> io::Error {
        self.state = state;
        self.body = None;
        self.fault = Some(fault.clone());
        fault.into()
    }

    /// Replaces the body after a transport fault, or returns the terminal state.
    fn reopen(&mut self, mut cause: Fault) -> Result<(), (StreamState, Fault)> {
        self.body = None;
        loop {
            if self.retries >= self.options.max_retry_requests {
                return Err((StreamState::Exhausted, cause));
            }
            self.ctx.check().map_err(|f| (StreamState::Failed, f))?;
            self.state = StreamState::Resuming;
            self.retries += 1;
            let descriptor = ResumeDescriptor {
                offset: self.delivered,
                etag: self.etag.clone(),
                remaining: self.expected.map(|total| total - self.delivered),
            };
            tracing::warn!(
                offset = descriptor.offset,
                remaining = ?descriptor.remaining,
                retry = self.retries,
                error = %cause,
                "resuming download"
            );
            match (self.resume)(&self.ctx, &descriptor) {
                Ok(resp) => {
                    if resp.etag() != self.etag.as_deref() {
                        return Err((
                            StreamState::Inconsistent,
                            Fault::Consistency {
                                expected: self.etag.clone(),
                                actual: resp.etag().map(str::to_string),
                            },
                        ));
                    }
                    self.body = Some(resp.into_body());
                    self.state = StreamState::Streaming;
                    return Ok(());
                }
                Err(f @ Fault::Transport { .. }) => cause = f,
                Err(f @ Fault::Consistency { .. }) => return Err((StreamState::Inconsistent, f)),
                Err(f) => return Err((StreamState::Failed, f)),
            }
        }
    }
}

impl<F> Read for ReliableStream<F>
where
    F: FnMut(&Context, &ResumeDescriptor) -> Result<Response, Fault> + Send,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone().into());
        }
        if buf.is_empty() || self.state == StreamState::Finished {
            return Ok(0);
        }
        loop {
            let want = match self.expected {
                Some(total) if self.delivered >= total => {
                    self.state = StreamState::Finished;
                    self.body = None;
                    return Ok(0);
                }
                Some(total) => buf.len().min(usize::try_from(total - self.delivered).unwrap_or(usize::MAX)),
                None => buf.len(),
            };
            let outcome = match self.body.as_mut() {
                Some(body) => body.read(&mut buf[..want]),
                None => Err(Fault::transport(TransportErrorKind::Read, "body unavailable").into()),
            };
            let cause = match outcome {
                Ok(0) => match self.expected {
                    Some(total) if self.delivered < total => Fault::transport(
                        TransportErrorKind::Read,
                        format!("body ended after {} of {} bytes", self.delivered, total),
                    ),
                    _ => {
                        self.state = StreamState::Finished;
                        self.body = None;
                        return Ok(0);
                    }
                },
                Ok(n) => {
                    self.delivered += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Fault::from(e),
            };
            if !matches!(cause, Fault::Transport { .. }) {
                let state = match cause {
                    Fault::Consistency { .. } => StreamState::Inconsistent,
                    _ => StreamState::Failed,
                };
                return Err(self.fail(state, cause));
            }
            if let Err((state, fault)) = self.reopen(cause) {
                if state == StreamState::Exhausted {
                    tracing::warn!(delivered = self.delivered, retries = self.retries, "resume budget exhausted");
                }
                return Err(self.fail(state, fault));
            }
        }
    }
}

impl<F> fmt::Debug for ReliableStream<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReliableStream")
            .field("etag", &self.etag)
            .field("expected", &self.expected)
            .field("delivered", &self.delivered)
            .field("retries", &self.retries)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Reads until `buf` is full or the reader reaches EOF; returns bytes read.
pub fn read_to_count(reader: &mut dyn Read, buf: &mut [u8]) -> Result<usize, Fault> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
