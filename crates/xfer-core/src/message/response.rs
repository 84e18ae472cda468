//! Incoming response with a lazily consumed body.

use super::{ERROR_CODE_HEADER, REQUEST_ID_HEADER};
use crate::fault::Fault;
use crate::range::ContentRange;
use http::header::{CONTENT_LENGTH, CONTENT_RANGE, ETAG};
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::io::{self, Read};

/// Response body stream. Ownership passes to the caller once the pipeline returns.
pub type ResponseBody = Box<dyn Read + Send>;

/// Most body text copied into a `Fault::Service` message.
const ERROR_BODY_LIMIT: u64 = 1024;

pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            headers,
            body: Box::new(body),
        }
    }

    /// Response with no headers and an empty body.
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, HeaderMap::new(), io::empty())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Opaque entity tag, compared byte-for-byte (quotes included).
    pub fn etag(&self) -> Option<&str> {
        self.headers.get(ETAG).and_then(|v| v.to_str().ok())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn content_range(&self) -> Option<ContentRange> {
        self.headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(ContentRange::parse)
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    pub fn set_body(&mut self, body: ResponseBody) {
        self.body = body;
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, ResponseBody) {
        (self.status, self.headers, self.body)
    }

    /// Pass 2xx responses through; turn anything else into `Fault::Service`,
    /// keeping the request id, service error code, and the start of the body.
    pub fn error_for_status(self) -> Result<Self, Fault> {
        if self.is_success() {
            return Ok(self);
        }
        Err(self.into_fault())
    }

    pub(crate) fn into_fault(self) -> Fault {
        let error_code = self.header_str(ERROR_CODE_HEADER).map(str::to_string);
        let request_id = self.header_str(REQUEST_ID_HEADER).map(str::to_string);
        let mut text = Vec::new();
        let _ = self.body.take(ERROR_BODY_LIMIT).read_to_end(&mut text);
        Fault::Service {
            status: self.status,
            error_code,
            request_id,
            message: String::from_utf8_lossy(&text).trim().to_string(),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
