use crate::context::Context;
use crate::fault::Fault;
use crate::message::{Request, Response};
use crate::pipeline::{Next, Policy};
use crate::transport::Transport;
use std::sync::Arc;

/// Terminal link: hands the request to the transport and never calls `next`.
pub struct TransportPolicy {
    transport: Arc<dyn Transport>,
}

impl TransportPolicy {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl Policy for TransportPolicy {
    fn process(&self, request: &mut Request, ctx: &Context, _next: Next<'_>) -> Result<Response, Fault> {
        ctx.check()?;
        self.transport.send(request, ctx)
    }

    fn name(&self) -> &'static str {
        "transport"
    }
}
