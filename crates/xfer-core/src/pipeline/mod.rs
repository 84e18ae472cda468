//! Ordered policy chain terminated by a transport.
//!
//! A `Pipeline` is built once per client and shared by reference across
//! threads. Each `send` owns its `Request`; policies see it through `&mut`
//! and hand the rest of the chain to the next link via `Next::run`.

mod builder;

pub use builder::PipelineBuilder;

use crate::context::Context;
use crate::fault::Fault;
use crate::message::{Request, Response};
use std::fmt;
use std::sync::Arc;

/// One link of the chain.
///
/// Implementations call `next.run` at most once per `process` call (the
/// retry policy calls it once per attempt on a fresh request clone) and
/// keep no per-request state of their own.
pub trait Policy: Send + Sync {
    fn process(&self, request: &mut Request, ctx: &Context, next: Next<'_>) -> Result<Response, Fault>;

    /// Short name used in logs and `Pipeline::policy_names`.
    fn name(&self) -> &'static str;
}

/// Continuation over the policies after the current one.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    policies: &'a [Arc<dyn Policy>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(policies: &'a [Arc<dyn Policy>]) -> Self {
        Self { policies }
    }

    /// Runs the remaining chain.
    pub fn run(self, request: &mut Request, ctx: &Context) -> Result<Response, Fault> {
        match self.policies.split_first() {
            Some((head, rest)) => head.process(request, ctx, Next::new(rest)),
            None => Err(Fault::config("pipeline ended without a transport")),
        }
    }

    /// Number of links still ahead.
    pub fn remaining(&self) -> usize {
        self.policies.len()
    }
}

/// Immutable, shareable policy chain.
#[derive(Clone)]
pub struct Pipeline {
    policies: Arc<[Arc<dyn Policy>]>,
}

impl Pipeline {
    /// Fails with `Fault::Config` when `policies` is empty.
    pub fn new(policies: Vec<Arc<dyn Policy>>) -> Result<Self, Fault> {
        if policies.is_empty() {
            return Err(Fault::config("pipeline needs at least one policy"));
        }
        Ok(Self {
            policies: policies.into(),
        })
    }

    /// Runs `request` through every policy in registration order.
    pub fn send(&self, mut request: Request, ctx: &Context) -> Result<Response, Fault> {
        ctx.check()?;
        Next::new(&self.policies).run(&mut request, ctx)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn policy_names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|p| p.name()).collect()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("policies", &self.policy_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{get, FnTransport};
    use crate::policy::TransportPolicy;
    use http::StatusCode;
    use std::sync::Mutex;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Policy for Recorder {
        fn process(&self, request: &mut Request, ctx: &Context, next: Next<'_>) -> Result<Response, Fault> {
            self.log.lock().unwrap().push(self.tag);
            next.run(request, ctx)
        }

        fn name(&self) -> &'static str {
            self.tag
        }
    }

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn Policy> {
        Arc::new(Recorder {
            tag,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn empty_pipeline_is_config_fault() {
        assert!(matches!(Pipeline::new(Vec::new()), Err(Fault::Config(_))));
    }

    #[test]
    fn policies_run_in_registration_order_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let transport = FnTransport::new(|_, _| Ok(Response::empty(StatusCode::OK)));
        let pipeline = Pipeline::new(vec![
            recorder("a", &log),
            recorder("b", &log),
            recorder("c", &log),
            Arc::new(TransportPolicy::new(Arc::new(transport))),
        ])
        .unwrap();
        let resp = pipeline.send(get("http://example.test/f"), &Context::new()).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn chain_without_transport_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![recorder("only", &log)]).unwrap();
        let err = pipeline.send(get("http://example.test/f"), &Context::new()).unwrap_err();
        assert!(matches!(err, Fault::Config(_)));
    }

    #[test]
    fn cancelled_context_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![recorder("a", &log)]).unwrap();
        let ctx = Context::new();
        ctx.cancel();
        assert!(matches!(pipeline.send(get("http://example.test/f"), &ctx), Err(Fault::Cancelled)));
        assert!(log.lock().unwrap().is_empty());
    }
}
