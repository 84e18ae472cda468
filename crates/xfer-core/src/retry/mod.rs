//! Retry and backoff.
//!
//! `RetryOptions` holds the knobs and the pure backoff math; `classify`
//! decides which faults are worth another attempt; `RetryPolicy` is the
//! pipeline link that re-drives the rest of the chain.

mod classify;
mod options;
mod policy;

pub use classify::classify_curl_error;
pub use options::{RetryDecision, RetryOptions};
pub use policy::RetryPolicy;
