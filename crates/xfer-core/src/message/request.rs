//! Outgoing request.

use super::Body;
use crate::fault::Fault;
use http::header::{HeaderMap, HeaderValue, IntoHeaderName};
use http::Method;
use url::Url;

/// One logical request. Built once per operation; the retry policy clones it
/// per attempt, so policies below retry never see each other's mutations.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Body,
    retry_count: u32,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Body::Empty,
            retry_count: 0,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing any previous value (names are case-insensitive).
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: &str) -> Result<(), Fault> {
        let value = HeaderValue::from_str(value)
            .map_err(|_| Fault::config(format!("invalid header value: {:?}", value)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Number of retries already made for this logical request (0 on the first attempt).
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn set_retry_count(&mut self, retry_count: u32) {
        self.retry_count = retry_count;
    }

    /// GET and HEAD only; these may be redirected to a secondary host.
    pub fn is_read_only(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD)
    }
}
