//! Test doubles shared by unit tests: closure transports, a fault-injecting
//! reader, and an in-memory ranged resource.

use crate::context::Context;
use crate::fault::{Fault, TransportErrorKind};
use crate::message::{Request, Response, CONTENT_LENGTH_HEADER, SERVER_ENCRYPTED_HEADER};
use crate::pipeline::{Next, Pipeline, PipelineBuilder, Policy};
use crate::retry::RetryOptions;
use crate::transport::Transport;
use http::header::{CONTENT_LENGTH, CONTENT_RANGE, ETAG, RANGE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub(crate) fn get(url: &str) -> Request {
    Request::new(Method::GET, Url::parse(url).unwrap())
}

/// Transport backed by a closure.
pub(crate) struct FnTransport {
    f: Box<dyn Fn(&Request, &Context) -> Result<Response, Fault> + Send + Sync>,
}

impl FnTransport {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(&Request, &Context) -> Result<Response, Fault> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

impl Transport for FnTransport {
    fn send(&self, request: &Request, ctx: &Context) -> Result<Response, Fault> {
        (self.f)(request, ctx)
    }
}

struct Capture(Arc<Mutex<Option<Request>>>);

impl Policy for Capture {
    fn process(&self, request: &mut Request, _ctx: &Context, _next: Next<'_>) -> Result<Response, Fault> {
        *self.0.lock().unwrap() = Some(request.clone());
        Ok(Response::empty(StatusCode::OK))
    }

    fn name(&self) -> &'static str {
        "capture"
    }
}

/// Runs one policy in front of a capturing sink and returns the request the sink saw.
pub(crate) fn run_policy(policy: &dyn Policy, mut request: Request) -> Request {
    let slot = Arc::new(Mutex::new(None));
    let tail: Vec<Arc<dyn Policy>> = vec![Arc::new(Capture(Arc::clone(&slot)))];
    policy
        .process(&mut request, &Context::new(), Next::new(&tail))
        .unwrap();
    let seen = slot.lock().unwrap().take();
    seen.expect("policy did not call next")
}

/// Yields `data` but fails with a reset after `fail_at` bytes.
pub(crate) struct FailAfter {
    inner: Cursor<Vec<u8>>,
    fail_at: u64,
}

impl FailAfter {
    pub(crate) fn new(data: Vec<u8>, fail_at: usize) -> Self {
        Self {
            inner: Cursor::new(data),
            fail_at: fail_at as u64,
        }
    }
}

impl Read for FailAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.inner.position();
        if pos >= self.fail_at {
            return Err(Fault::transport(TransportErrorKind::Reset, "injected reset").into());
        }
        let allowed = ((self.fail_at - pos) as usize).min(buf.len());
        self.inner.read(&mut buf[..allowed])
    }
}

/// Response with `ETag` and `Content-Length` set.
pub(crate) fn ranged_response(status: StatusCode, etag: &str, len: u64, body: impl Read + Send + 'static) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(ETAG, HeaderValue::from_str(etag).unwrap());
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    Response::new(status, headers, body)
}

pub(crate) fn payload(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8 ^ (i >> 12) as u8).collect()
}

/// One request seen by `MemoryServer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Logged {
    pub method: Method,
    pub range: Option<String>,
}

/// Mutable state of a `MemoryServer`; tests poke at it directly.
#[derive(Default)]
pub(crate) struct ServerState {
    pub data: Vec<u8>,
    pub etag: String,
    /// Answer ranged GETs with 200 and the whole body.
    pub ignore_ranges: bool,
    pub log: Vec<Logged>,
    /// Range start → bytes served before a reset, applied once.
    pub fail_body_once: HashMap<u64, usize>,
    /// Range start → status returned on every request for it.
    pub status_for: HashMap<u64, StatusCode>,
    /// Range start → ETag reported instead of `etag`.
    pub etag_for: HashMap<u64, String>,
    /// Range start → start reported in `Content-Range` instead of the real one.
    pub misreport_start: HashMap<u64, u64>,
    /// Transient 503s to return before serving normally.
    pub busy_responses: usize,
    /// Time each request spends "on the wire".
    pub latency: Duration,
}

/// In-memory resource speaking the range protocol used by `TransferClient`.
#[derive(Default)]
pub(crate) struct MemoryServer {
    pub state: Mutex<ServerState>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.parse().ok()?;
    let end = if end.is_empty() { None } else { Some(end.parse().ok()?) };
    Some((start, end))
}

impl MemoryServer {
    pub(crate) fn with_data(data: Vec<u8>) -> Arc<Self> {
        let server = MemoryServer::default();
        {
            let mut st = server.state.lock().unwrap();
            st.data = data;
            st.etag = "\"v1\"".to_string();
        }
        Arc::new(server)
    }

    /// Most requests observed in flight at once.
    pub(crate) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn log(&self) -> Vec<Logged> {
        self.state.lock().unwrap().log.clone()
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        self.state.lock().unwrap().data.clone()
    }

    fn handle(&self, request: &Request) -> Result<Response, Fault> {
        let mut st = self.state.lock().unwrap();
        let range = request.header_str(RANGE.as_str()).map(str::to_string);
        st.log.push(Logged {
            method: request.method().clone(),
            range: range.clone(),
        });
        if st.busy_responses > 0 {
            st.busy_responses -= 1;
            return Ok(Response::empty(StatusCode::SERVICE_UNAVAILABLE));
        }
        match *request.method() {
            Method::GET => self.serve_get(&mut st, range.as_deref()),
            Method::PUT => self.serve_put(&mut st, request, range.as_deref()),
            _ => Ok(Response::empty(StatusCode::METHOD_NOT_ALLOWED)),
        }
    }

    fn serve_get(&self, st: &mut ServerState, range: Option<&str>) -> Result<Response, Fault> {
        let len = st.data.len() as u64;
        let parsed = range.and_then(parse_range).filter(|_| !st.ignore_ranges);
        let Some((start, end)) = parsed else {
            return Ok(ranged_response(StatusCode::OK, &st.etag, len, Cursor::new(st.data.clone())));
        };
        if let Some(status) = st.status_for.get(&start) {
            return Ok(Response::empty(*status));
        }
        if start >= len {
            let mut resp = Response::empty(StatusCode::RANGE_NOT_SATISFIABLE);
            resp.headers_mut()
                .insert(CONTENT_RANGE, HeaderValue::from_str(&format!("bytes */{}", len)).unwrap());
            return Ok(resp);
        }
        let last = end.unwrap_or(len - 1).min(len - 1);
        let slice = st.data[start as usize..=last as usize].to_vec();
        let etag = st.etag_for.get(&start).cloned().unwrap_or_else(|| st.etag.clone());
        let count = slice.len() as u64;
        let mut resp = match st.fail_body_once.remove(&start) {
            Some(k) => ranged_response(StatusCode::PARTIAL_CONTENT, &etag, count, FailAfter::new(slice, k)),
            None => ranged_response(StatusCode::PARTIAL_CONTENT, &etag, count, Cursor::new(slice)),
        };
        resp.headers_mut().insert(
            CONTENT_RANGE,
            HeaderValue::from_str(&format!(
                "bytes {}-{}/{}",
                st.misreport_start.get(&start).copied().unwrap_or(start),
                last,
                len
            ))
            .unwrap(),
        );
        resp.headers_mut()
            .insert(SERVER_ENCRYPTED_HEADER, HeaderValue::from_static("true"));
        Ok(resp)
    }

    fn serve_put(&self, st: &mut ServerState, request: &Request, range: Option<&str>) -> Result<Response, Fault> {
        if let Some(size) = request.header_str(CONTENT_LENGTH_HEADER) {
            let size: usize = size.parse().unwrap();
            st.data = vec![0; size];
            let mut resp = Response::empty(StatusCode::CREATED);
            resp.headers_mut()
                .insert(SERVER_ENCRYPTED_HEADER, HeaderValue::from_static("true"));
            resp.headers_mut()
                .insert(ETAG, HeaderValue::from_str(&st.etag).unwrap());
            return Ok(resp);
        }
        let Some((start, Some(end))) = range.and_then(parse_range) else {
            return Ok(Response::empty(StatusCode::BAD_REQUEST));
        };
        if let Some(status) = st.status_for.get(&start) {
            return Ok(Response::empty(*status));
        }
        let mut body = Vec::new();
        request.body().reader().read_to_end(&mut body)?;
        if body.len() as u64 != end - start + 1 || end as usize >= st.data.len() {
            return Ok(Response::empty(StatusCode::BAD_REQUEST));
        }
        st.data[start as usize..=end as usize].copy_from_slice(&body);
        let mut resp = Response::empty(StatusCode::CREATED);
        resp.headers_mut()
            .insert(ETAG, HeaderValue::from_str(&format!("\"w{}\"", start)).unwrap());
        Ok(resp)
    }
}

impl Transport for MemoryServer {
    fn send(&self, request: &Request, ctx: &Context) -> Result<Response, Fault> {
        ctx.check()?;
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let latency = self.state.lock().unwrap().latency;
        std::thread::sleep(latency);
        let result = self.handle(request);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Standard pipeline over `server` with millisecond backoff.
pub(crate) fn pipeline_for(server: &Arc<MemoryServer>) -> Arc<Pipeline> {
    let transport: Arc<dyn Transport> = Arc::clone(server) as Arc<dyn Transport>;
    let pipeline = PipelineBuilder::new(transport)
        .retry(RetryOptions {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryOptions::default()
        })
        .build()
        .unwrap();
    Arc::new(pipeline)
}
