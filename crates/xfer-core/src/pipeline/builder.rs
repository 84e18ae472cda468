//! Standard pipeline assembly.

use super::{Pipeline, Policy};
use crate::fault::Fault;
use crate::policy::{
    AuthPolicy, CredentialProvider, LoggingPolicy, RequestIdPolicy, TelemetryPolicy, TransportPolicy,
};
use crate::retry::{RetryOptions, RetryPolicy};
use crate::transport::Transport;
use std::sync::Arc;

/// Builds the usual client chain:
/// telemetry, request id, per-operation policies, retry, per-retry policies,
/// auth, logging, transport.
pub struct PipelineBuilder {
    component: String,
    version: String,
    retry: RetryOptions,
    per_operation: Vec<Arc<dyn Policy>>,
    per_retry: Vec<Arc<dyn Policy>>,
    credential: Option<Arc<dyn CredentialProvider>>,
    logging: bool,
    transport: Arc<dyn Transport>,
}

impl PipelineBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            component: "core".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            retry: RetryOptions::default(),
            per_operation: Vec::new(),
            per_retry: Vec::new(),
            credential: None,
            logging: true,
            transport,
        }
    }

    /// Component name reported in the `User-Agent`.
    pub fn component(mut self, component: impl Into<String>, version: impl Into<String>) -> Self {
        self.component = component.into();
        self.version = version.into();
        self
    }

    pub fn retry(mut self, options: RetryOptions) -> Self {
        self.retry = options;
        self
    }

    /// Runs once per `send`, outside the retry loop.
    pub fn per_operation(mut self, policy: Arc<dyn Policy>) -> Self {
        self.per_operation.push(policy);
        self
    }

    /// Runs once per attempt, inside the retry loop.
    pub fn per_retry(mut self, policy: Arc<dyn Policy>) -> Self {
        self.per_retry.push(policy);
        self
    }

    pub fn credential(mut self, credential: Arc<dyn CredentialProvider>) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    pub fn build(self) -> Result<Pipeline, Fault> {
        let retry = RetryPolicy::new(self.retry)?;
        let mut policies: Vec<Arc<dyn Policy>> = Vec::with_capacity(6 + self.per_operation.len() + self.per_retry.len());
        policies.push(Arc::new(TelemetryPolicy::new(&self.component, &self.version)?));
        policies.push(Arc::new(RequestIdPolicy));
        policies.extend(self.per_operation);
        policies.push(Arc::new(retry));
        policies.extend(self.per_retry);
        if let Some(credential) = self.credential {
            policies.push(Arc::new(AuthPolicy::new(credential)));
        }
        if self.logging {
            policies.push(Arc::new(LoggingPolicy));
        }
        policies.push(Arc::new(TransportPolicy::new(self.transport)));
        Pipeline::new(policies)
    }
}
