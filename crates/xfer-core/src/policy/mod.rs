//! Concrete policies for the standard pipeline.

mod auth;
mod logging;
mod request_id;
mod telemetry;
mod transport;

pub use crate::retry::RetryPolicy;
pub use auth::{AuthPolicy, CredentialProvider, StaticCredential};
pub use logging::LoggingPolicy;
pub use request_id::RequestIdPolicy;
pub use telemetry::TelemetryPolicy;
pub use transport::TransportPolicy;
