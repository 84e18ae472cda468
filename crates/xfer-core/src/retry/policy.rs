//! Pipeline link that re-drives the rest of the chain on retryable failures.

use super::options::{RetryDecision, RetryOptions};
use crate::context::Context;
use crate::fault::Fault;
use crate::message::{Request, Response};
use crate::pipeline::{Next, Policy};
use http::StatusCode;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    options: RetryOptions,
}

impl RetryPolicy {
    /// Fails with `Fault::Config` if `options` do not validate.
    pub fn new(options: RetryOptions) -> Result<Self, Fault> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Attempt clone for attempt `n`, pointed at the secondary host if asked.
    fn prepare(&self, request: &Request, attempt: u32, secondary: Option<&str>) -> Result<Request, Fault> {
        let mut this = request.clone();
        this.set_retry_count(attempt - 1);
        if let Some(host) = secondary {
            set_authority(&mut this, host)?;
        }
        Ok(this)
    }
}

/// Replace host (and port, when given) of the request URL.
fn set_authority(request: &mut Request, authority: &str) -> Result<(), Fault> {
    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) if !h.contains(':') || (h.starts_with('[') && h.ends_with(']')) => {
            let port = p
                .parse::<u16>()
                .map_err(|_| Fault::config(format!("secondary host {:?}: bad port", authority)))?;
            (h, Some(port))
        }
        _ => (authority, None),
    };
    let url = request.url_mut();
    url.set_host(Some(host))
        .map_err(|e| Fault::config(format!("secondary host {:?}: {}", authority, e)))?;
    if port.is_some() {
        url.set_port(port)
            .map_err(|_| Fault::config(format!("secondary host {:?}: cannot carry a port", authority)))?;
    }
    Ok(())
}

impl Policy for RetryPolicy {
    fn process(&self, request: &mut Request, ctx: &Context, next: Next<'_>) -> Result<Response, Fault> {
        let idempotent = request.method().is_idempotent();
        let mut secondary = match &self.options.secondary_host {
            Some(host) if request.is_read_only() => Some(host.as_str()),
            _ => None,
        };
        let mut last_primary: Option<Fault> = None;
        let mut attempt = 1u32;
        loop {
            ctx.check()?;
            let target = secondary.filter(|_| attempt % 2 == 0);
            let mut this = self.prepare(request, attempt, target)?;
            let outcome = next.run(&mut this, ctx);

            let (fault, retryable) = match outcome {
                Ok(resp) if resp.is_success() => return Ok(resp),
                Ok(resp) if target.is_some() && resp.status() == StatusCode::NOT_FOUND => {
                    // Replica has not caught up; stay on the primary from here on.
                    tracing::warn!(attempt, host = target.unwrap_or_default(), "secondary host returned 404, disabling it");
                    secondary = None;
                    (resp.into_fault(), true)
                }
                Ok(resp) if self.options.is_retryable_status(resp.status()) => (resp.into_fault(), true),
                Ok(resp) => return Ok(resp),
                Err(Fault::Cancelled) => return Err(Fault::Cancelled),
                Err(f) => {
                    let retryable = f.is_retryable_by(&self.options);
                    (f, retryable)
                }
            };

            if target.is_none() {
                last_primary = Some(fault.clone());
            }

            match self.options.decide(attempt, retryable && idempotent) {
                RetryDecision::NoRetry => {
                    if retryable && idempotent {
                        tracing::warn!(attempt, error = %fault, "retries exhausted");
                        return Err(last_primary.unwrap_or(fault));
                    }
                    return Err(fault);
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        attempt,
                        kind = fault.kind_name(),
                        error = %fault,
                        delay_ms = delay.as_millis() as u64,
                        "retrying request"
                    );
                    ctx.sleep(delay)?;
                    attempt += 1;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "retry"
    }
}
