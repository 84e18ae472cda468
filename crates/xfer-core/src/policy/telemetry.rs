use crate::context::Context;
use crate::fault::Fault;
use crate::message::{Request, Response};
use crate::pipeline::{Next, Policy};
use http::header::USER_AGENT;
use http::HeaderValue;

/// Tags each request with `User-Agent: xfer-<component>/<version> (rust; <os>)`.
/// A caller-supplied `User-Agent` is left alone.
#[derive(Debug, Clone)]
pub struct TelemetryPolicy {
    user_agent: HeaderValue,
}

impl TelemetryPolicy {
    pub fn new(component: &str, version: &str) -> Result<Self, Fault> {
        let text = format!("xfer-{}/{} (rust; {})", component, version, std::env::consts::OS);
        let user_agent = HeaderValue::from_str(&text)
            .map_err(|_| Fault::config(format!("invalid telemetry component {:?}", component)))?;
        Ok(Self { user_agent })
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.to_str().unwrap_or_default()
    }
}

impl Policy for TelemetryPolicy {
    fn process(&self, request: &mut Request, ctx: &Context, next: Next<'_>) -> Result<Response, Fault> {
        if !request.headers().contains_key(USER_AGENT) {
            request.headers_mut().insert(USER_AGENT, self.user_agent.clone());
        }
        next.run(request, ctx)
    }

    fn name(&self) -> &'static str {
        "telemetry"
    }
}
