//! Authorization header injection.

use crate::context::Context;
use crate::fault::Fault;
use crate::message::{Request, Response};
use crate::pipeline::{Next, Policy};
use http::header::AUTHORIZATION;
use http::HeaderValue;
use std::fmt;
use std::sync::Arc;

/// Yields an `Authorization` header value on demand. Token acquisition and
/// refresh belong to the implementor.
pub trait CredentialProvider: Send + Sync {
    fn authorization(&self, ctx: &Context) -> Result<String, Fault>;
}

/// Fixed bearer token.
#[derive(Clone)]
pub struct StaticCredential {
    value: String,
}

impl StaticCredential {
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self {
            value: format!("Bearer {}", token.as_ref()),
        }
    }
}

impl fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticCredential(<redacted>)")
    }
}

impl CredentialProvider for StaticCredential {
    fn authorization(&self, _ctx: &Context) -> Result<String, Fault> {
        Ok(self.value.clone())
    }
}

/// Asks the provider for a header on every attempt, so a provider that
/// refreshes tokens is consulted again after a backoff.
pub struct AuthPolicy {
    credential: Arc<dyn CredentialProvider>,
}

impl AuthPolicy {
    pub fn new(credential: Arc<dyn CredentialProvider>) -> Self {
        Self { credential }
    }
}

impl Policy for AuthPolicy {
    fn process(&self, request: &mut Request, ctx: &Context, next: Next<'_>) -> Result<Response, Fault> {
        let value = self.credential.authorization(ctx)?;
        let mut header = HeaderValue::from_str(&value)
            .map_err(|_| Fault::config("credential produced an invalid authorization header"))?;
        header.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, header);
        next.run(request, ctx)
    }

    fn name(&self) -> &'static str {
        "auth"
    }
}
