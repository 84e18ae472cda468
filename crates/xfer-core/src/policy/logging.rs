use crate::context::Context;
use crate::fault::Fault;
use crate::message::{Request, Response};
use crate::pipeline::{Next, Policy};
use std::time::Instant;
use url::Url;

/// Emits one `tracing` event per attempt. Headers are not logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPolicy;

/// URL without query string or fragment (SAS tokens and the like live there).
pub(crate) fn redacted_url(url: &Url) -> String {
    let mut u = url.clone();
    u.set_query(None);
    u.set_fragment(None);
    let _ = u.set_password(None);
    u.to_string()
}

impl Policy for LoggingPolicy {
    fn process(&self, request: &mut Request, ctx: &Context, next: Next<'_>) -> Result<Response, Fault> {
        let url = redacted_url(request.url());
        let method = request.method().clone();
        let attempt = request.retry_count() + 1;
        let started = Instant::now();
        tracing::debug!(%method, %url, attempt, "sending request");
        let result = next.run(request, ctx);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(resp) => {
                tracing::debug!(%method, %url, attempt, status = resp.status().as_u16(), elapsed_ms, "response received")
            }
            Err(e) => {
                tracing::debug!(%method, %url, attempt, kind = e.kind_name(), error = %e, elapsed_ms, "request failed")
            }
        }
        result
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}
