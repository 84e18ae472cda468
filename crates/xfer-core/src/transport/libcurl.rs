//! libcurl transport.
//!
//! Each `send` runs one easy handle on a dedicated thread. The thread reports
//! the final response head, then body chunks, through a bounded channel, so
//! the caller gets a `Response` as soon as headers arrive and the body is
//! pulled lazily. A full channel stalls the transfer; dropping the body
//! aborts it.

use crate::context::Context;
use crate::fault::{Fault, TransportErrorKind};
use crate::message::{Request, Response};
use crate::retry::classify_curl_error;
use crate::transport::Transport;
use curl::easy::{Easy, List, ReadError};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use std::cell::RefCell;
use std::io::{self, Read};
use std::str;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard cap on one exchange, if any.
    pub timeout: Option<Duration>,
    pub follow_redirects: bool,
    /// Body chunks buffered between the transfer thread and the reader.
    pub buffered_chunks: usize,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Some(Duration::from_secs(3600)),
            follow_redirects: true,
            buffered_chunks: 16,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: CurlOptions,
}

impl CurlTransport {
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }
}

enum Event {
    Head { status: StatusCode, headers: HeaderMap },
    Data(Vec<u8>),
    Done(Result<(), Fault>),
}

impl Transport for CurlTransport {
    fn send(&self, request: &Request, ctx: &Context) -> Result<Response, Fault> {
        ctx.check()?;
        let (tx, rx) = mpsc::sync_channel::<Event>(self.options.buffered_chunks.max(1));
        let options = self.options.clone();
        let request = request.clone();
        let ctx = ctx.clone();
        thread::Builder::new()
            .name("xfer-curl".to_string())
            .spawn(move || {
                let result = perform(&options, &request, &ctx, &tx);
                let _ = tx.send(Event::Done(result));
            })
            .map_err(|e| Fault::transport(TransportErrorKind::Other, format!("spawn transfer thread: {}", e)))?;

        loop {
            match rx.recv() {
                Ok(Event::Head { status, headers }) => {
                    return Ok(Response::new(status, headers, CurlBody::new(rx)));
                }
                Ok(Event::Data(_)) => continue,
                Ok(Event::Done(Err(fault))) => return Err(fault),
                Ok(Event::Done(Ok(()))) | Err(_) => {
                    return Err(Fault::transport(
                        TransportErrorKind::Reset,
                        "connection closed before a response head arrived",
                    ))
                }
            }
        }
    }
}

/// Header block being collected; one block per response (1xx, redirects, final).
#[derive(Default)]
struct HeadState {
    status: Option<StatusCode>,
    headers: HeaderMap,
    sent: bool,
    receiver_gone: bool,
    cancelled: bool,
}

fn parse_status_line(line: &str) -> Option<StatusCode> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    let code = line.split_whitespace().nth(1)?;
    StatusCode::from_bytes(code.as_bytes()).ok()
}

fn parse_header_line(line: &str) -> Option<(HeaderName, HeaderValue)> {
    let (name, value) = line.split_once(':')?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
    let value = HeaderValue::from_str(value.trim()).ok()?;
    Some((name, value))
}

fn configure(easy: &mut Easy, options: &CurlOptions, request: &Request) -> Result<(), curl::Error> {
    easy.url(request.url().as_str())?;
    easy.follow_location(options.follow_redirects)?;
    easy.connect_timeout(options.connect_timeout)?;
    easy.low_speed_limit(options.low_speed_limit)?;
    easy.low_speed_time(options.low_speed_time)?;
    if let Some(t) = options.timeout {
        easy.timeout(t)?;
    }
    easy.progress(true)?;

    let body_len = request.body().len();
    match *request.method() {
        Method::GET => easy.get(true)?,
        Method::HEAD => easy.nobody(true)?,
        Method::PUT => {
            easy.upload(true)?;
            easy.in_filesize(body_len)?;
        }
        Method::POST => {
            easy.post(true)?;
            easy.post_field_size(body_len)?;
        }
        ref other => {
            if body_len > 0 {
                easy.upload(true)?;
                easy.in_filesize(body_len)?;
            }
            easy.custom_request(other.as_str())?;
        }
    }

    let mut list = List::new();
    for (name, value) in request.headers() {
        list.append(&format!("{}: {}", name.as_str(), String::from_utf8_lossy(value.as_bytes())))?;
    }
    // No 100-continue round trip for range writes.
    list.append("Expect:")?;
    easy.http_headers(list)?;
    Ok(())
}

/// Runs the exchange on the current (transfer) thread, streaming events to `tx`.
fn perform(options: &CurlOptions, request: &Request, ctx: &Context, tx: &SyncSender<Event>) -> Result<(), Fault> {
    let mut easy = Easy::new();
    configure(&mut easy, options, request)
        .map_err(|e| Fault::config(format!("curl setup for {}: {}", request.url(), e)))?;

    let state = RefCell::new(HeadState::default());
    let read_fault: RefCell<Option<Fault>> = RefCell::new(None);
    let mut body = request.body().reader();

    let result = {
        let mut transfer = easy.transfer();
        let setup = |e: curl::Error| Fault::config(format!("curl callbacks: {}", e));
        transfer
            .header_function(|data| {
                let line = match str::from_utf8(data) {
                    Ok(s) => s.trim_end(),
                    Err(_) => return true,
                };
                let mut st = state.borrow_mut();
                if st.sent {
                    return true;
                }
                if let Some(status) = parse_status_line(line) {
                    st.status = Some(status);
                    st.headers = HeaderMap::new();
                    return true;
                }
                if !line.is_empty() {
                    if let Some((name, value)) = parse_header_line(line) {
                        st.headers.append(name, value);
                    }
                    return true;
                }
                // End of a header block.
                let Some(status) = st.status else { return true };
                if status.is_informational() {
                    return true;
                }
                if status.is_redirection() && options.follow_redirects && st.headers.contains_key(http::header::LOCATION) {
                    return true;
                }
                let headers = std::mem::take(&mut st.headers);
                st.sent = true;
                if tx.send(Event::Head { status, headers }).is_err() {
                    st.receiver_gone = true;
                    return false;
                }
                true
            })
            .map_err(setup)?;
        transfer
            .write_function(|data| {
                let mut st = state.borrow_mut();
                if ctx.is_cancelled() {
                    st.cancelled = true;
                    return Ok(0);
                }
                if !st.sent {
                    // Body of a skipped interim or redirect response.
                    return Ok(data.len());
                }
                if tx.send(Event::Data(data.to_vec())).is_err() {
                    st.receiver_gone = true;
                    return Ok(0);
                }
                Ok(data.len())
            })
            .map_err(setup)?;
        transfer
            .read_function(|buf| match body.read(buf) {
                Ok(n) => Ok(n),
                Err(e) => {
                    *read_fault.borrow_mut() = Some(Fault::from(e));
                    Err(ReadError::Abort)
                }
            })
            .map_err(setup)?;
        transfer
            .progress_function(|_, _, _, _| !ctx.is_cancelled())
            .map_err(setup)?;
        transfer.perform()
    };

    let st = state.into_inner();
    if let Err(e) = result {
        if st.cancelled || ctx.is_cancelled() {
            return Err(Fault::Cancelled);
        }
        if st.receiver_gone {
            return Ok(());
        }
        if let Some(fault) = read_fault.into_inner() {
            return Err(fault);
        }
        return Err(Fault::transport(classify_curl_error(&e), e.to_string()));
    }

    if !st.sent {
        let code = easy.response_code().unwrap_or(0);
        let status = u16::try_from(code)
            .ok()
            .and_then(|c| StatusCode::from_u16(c).ok())
            .ok_or_else(|| Fault::transport(TransportErrorKind::Other, "response without a status line"))?;
        let _ = tx.send(Event::Head {
            status,
            headers: HeaderMap::new(),
        });
    }
    Ok(())
}

/// Response body fed by the transfer thread.
struct CurlBody {
    rx: Receiver<Event>,
    chunk: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl CurlBody {
    fn new(rx: Receiver<Event>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
            finished: false,
        }
    }
}

impl Read for CurlBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pos < self.chunk.len() {
                let n = (self.chunk.len() - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Event::Data(data)) => {
                    self.chunk = data;
                    self.pos = 0;
                }
                Ok(Event::Head { .. }) => {}
                Ok(Event::Done(Ok(()))) => self.finished = true,
                Ok(Event::Done(Err(fault))) => {
                    self.finished = true;
                    return Err(fault.into());
                }
                Err(_) => {
                    self.finished = true;
                    return Err(Fault::transport(TransportErrorKind::Reset, "transfer thread ended early").into());
                }
            }
        }
    }
}
