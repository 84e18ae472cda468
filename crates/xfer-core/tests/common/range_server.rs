//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one mutable resource: Range GET with ETag and Content-Range, PUT
//! with `x-content-length` to (re)create it, and PUT with `Range` to write
//! into it. Every response closes the connection.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RangeServerOptions {
    /// Answer every GET with 200 and the whole body.
    pub ignore_ranges: bool,
    /// For the first GET whose range starts here, send only this many body bytes, then hang up.
    pub drop_once_at: Option<(u64, usize)>,
    /// After this many GETs, report a different ETag.
    pub etag_change_after: Option<usize>,
    /// Transient 503s before serving normally.
    pub busy_responses: usize,
    /// Pause between 4 KiB blocks of every ranged GET body.
    pub throttle: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub method: String,
    pub range: Option<String>,
}

struct State {
    body: Vec<u8>,
    etag: String,
    gets: usize,
    opts: RangeServerOptions,
    seen: Vec<SeenRequest>,
}

pub struct RangeServer {
    url: String,
    state: Arc<Mutex<State>>,
}

impl RangeServer {
    pub fn start(body: Vec<u8>) -> Self {
        Self::start_with_options(body, RangeServerOptions::default())
    }

    pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State {
            body,
            etag: "\"v1\"".to_string(),
            gets: 0,
            opts,
            seen: Vec::new(),
        }));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            url: format!("http://127.0.0.1:{}/blob.bin", port),
            state,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> Vec<u8> {
        self.state.lock().unwrap().body.clone()
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.lock().unwrap().seen.clone()
    }
}

struct Parsed {
    method: String,
    range: Option<(u64, Option<u64>)>,
    range_raw: Option<String>,
    create_size: Option<usize>,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Option<Parsed> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 8192];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut tmp).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };
    let head = std::str::from_utf8(&buf[..head_end]).ok()?.to_string();
    let mut lines = head.lines();
    let method = lines.next()?.split_whitespace().next()?.to_string();
    let mut content_length = 0usize;
    let mut range_raw = None;
    let mut create_size = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.parse().unwrap_or(0),
            "range" => range_raw = Some(value.to_string()),
            "x-content-length" => create_size = value.parse().ok(),
            _ => {}
        }
    }
    let mut body = buf[head_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut tmp).ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    let range = range_raw.as_deref().and_then(parse_range);
    Some(Parsed {
        method,
        range,
        range_raw,
        create_size,
        body,
    })
}

fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let (a, b) = value.strip_prefix("bytes=")?.split_once('-')?;
    let start = a.trim().parse().ok()?;
    let end = match b.trim() {
        "" => None,
        e => Some(e.parse().ok()?),
    };
    Some((start, end))
}

fn write_head(stream: &mut TcpStream, status: &str, headers: &[(&str, String)], body_len: usize) {
    let mut head = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", status, body_len);
    for (k, v) in headers {
        head.push_str(&format!("{}: {}\r\n", k, v));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[(&str, String)], body: &[u8]) {
    write_head(stream, status, headers, body.len());
    let _ = stream.write_all(body);
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    let mut st = state.lock().unwrap();
    st.seen.push(SeenRequest {
        method: req.method.clone(),
        range: req.range_raw.clone(),
    });
    if st.opts.busy_responses > 0 {
        st.opts.busy_responses -= 1;
        drop(st);
        respond(&mut stream, "503 Service Unavailable", &[], b"busy");
        return;
    }
    match req.method.as_str() {
        "GET" => serve_get(stream, st, req),
        "PUT" => serve_put(stream, st, req),
        _ => {
            drop(st);
            respond(&mut stream, "405 Method Not Allowed", &[], b"");
        }
    }
}

fn serve_get(mut stream: TcpStream, mut st: std::sync::MutexGuard<'_, State>, req: Parsed) {
    st.gets += 1;
    if st.opts.etag_change_after.is_some_and(|n| st.gets > n) {
        st.etag = "\"v2\"".to_string();
    }
    let etag = st.etag.clone();
    let total = st.body.len() as u64;
    let range = req.range.filter(|_| !st.opts.ignore_ranges);
    let Some((start, end)) = range else {
        let body = st.body.clone();
        drop(st);
        respond(&mut stream, "200 OK", &[("ETag", etag)], &body);
        return;
    };
    if start >= total {
        drop(st);
        respond(
            &mut stream,
            "416 Range Not Satisfiable",
            &[("Content-Range", format!("bytes */{}", total))],
            b"",
        );
        return;
    }
    let last = end.unwrap_or(total - 1).min(total - 1);
    let slice = st.body[start as usize..=last as usize].to_vec();
    let throttle = st.opts.throttle;
    let drop_after = match st.opts.drop_once_at {
        Some((at, k)) if at == start => {
            st.opts.drop_once_at = None;
            Some(k)
        }
        _ => None,
    };
    drop(st);
    let headers = [
        ("ETag", etag),
        ("Content-Range", format!("bytes {}-{}/{}", start, last, total)),
        ("x-server-encrypted", "true".to_string()),
    ];
    match drop_after {
        Some(k) => {
            write_head(&mut stream, "206 Partial Content", &headers, slice.len());
            let _ = stream.write_all(&slice[..k.min(slice.len())]);
            let _ = stream.flush();
            let _ = stream.shutdown(Shutdown::Both);
        }
        None => match throttle {
            Some(pause) => {
                write_head(&mut stream, "206 Partial Content", &headers, slice.len());
                for block in slice.chunks(4096) {
                    if stream.write_all(block).is_err() {
                        return;
                    }
                    thread::sleep(pause);
                }
            }
            None => respond(&mut stream, "206 Partial Content", &headers, &slice),
        },
    }
}

fn serve_put(mut stream: TcpStream, mut st: std::sync::MutexGuard<'_, State>, req: Parsed) {
    if let Some(size) = req.create_size {
        st.body = vec![0; size];
        let etag = st.etag.clone();
        drop(st);
        respond(
            &mut stream,
            "201 Created",
            &[("ETag", etag), ("x-server-encrypted", "true".to_string())],
            b"",
        );
        return;
    }
    let Some((start, Some(end))) = req.range else {
        drop(st);
        respond(&mut stream, "400 Bad Request", &[], b"missing range");
        return;
    };
    let (start, end) = (start as usize, end as usize);
    if end >= st.body.len() || req.body.len() != end - start + 1 {
        drop(st);
        respond(&mut stream, "400 Bad Request", &[], b"bad range");
        return;
    }
    st.body[start..=end].copy_from_slice(&req.body);
    drop(st);
    respond(&mut stream, "201 Created", &[("ETag", format!("\"w{}\"", start))], b"");
}
