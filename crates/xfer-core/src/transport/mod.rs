//! The transport sink: the one component that touches the network.

mod libcurl;

pub use libcurl::{CurlOptions, CurlTransport};

use crate::context::Context;
use crate::fault::Fault;
use crate::message::{Request, Response};

/// Executes one request and returns the raw response (any status) or a
/// transport-level fault. The response body may still be streaming when
/// `send` returns; reading it surfaces later transport faults as `io::Error`
/// wrapping a `Fault`.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request, ctx: &Context) -> Result<Response, Fault>;
}
