//! Request, response and body types that flow through the pipeline.

mod body;
mod request;
mod response;

pub use body::{Body, BodyReader};
pub use request::Request;
pub use response::{Response, ResponseBody};

/// Correlation id header set by `RequestIdPolicy` and echoed by services.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Service error code header, copied into `Fault::Service`.
pub const ERROR_CODE_HEADER: &str = "x-error-code";
/// Size declared when creating a resource before range writes.
pub const CONTENT_LENGTH_HEADER: &str = "x-content-length";
/// Set to `true` by services that encrypt stored data.
pub const SERVER_ENCRYPTED_HEADER: &str = "x-server-encrypted";
