use crate::fault::{Fault, TransportErrorKind};
use rand::Rng;
use std::collections::BTreeSet;
use std::time::Duration;

/// Largest exponent applied to `base_delay`; beyond this the cap always wins.
const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Decision returned by `RetryOptions::decide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this failure.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff with jitter, plus what counts as retryable.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, before jitter.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Fraction in `[0, 1]`; each delay is scaled by a factor in `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
    pub retryable_status_codes: BTreeSet<u16>,
    pub retryable_transport_kinds: BTreeSet<TransportErrorKind>,
    /// Alternate host (`name` or `name:port`) tried on even attempts of read-only requests.
    pub secondary_host: Option<String>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
            retryable_status_codes: [408, 429, 500, 502, 503, 504].into_iter().collect(),
            retryable_transport_kinds: [
                TransportErrorKind::Dns,
                TransportErrorKind::Connect,
                TransportErrorKind::Timeout,
                TransportErrorKind::Reset,
                TransportErrorKind::Read,
            ]
            .into_iter()
            .collect(),
            secondary_host: None,
        }
    }
}

impl RetryOptions {
    pub fn validate(&self) -> Result<(), Fault> {
        if self.max_attempts == 0 {
            return Err(Fault::config("retry max_attempts must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Fault::config(format!("retry jitter {} outside [0, 1]", self.jitter)));
        }
        if let Some(host) = &self.secondary_host {
            let candidate = format!("http://{}/", host);
            match url::Url::parse(&candidate) {
                Ok(u) if u.path() == "/" && u.host_str().is_some() => {}
                _ => return Err(Fault::config(format!("invalid secondary host {:?}", host))),
            }
        }
        Ok(())
    }

    /// Un-jittered delay after attempt `n` (1-based): `base * 2^(n-1)`.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    /// Jittered delay after attempt `n`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };
        let scaled = Duration::try_from_secs_f64(nominal.as_secs_f64() * factor).unwrap_or(self.max_delay);
        scaled.min(self.max_delay)
    }

    /// `attempt` is 1-based. Returns `NoRetry` for non-retryable failures and
    /// once `max_attempts` have been made.
    pub fn decide(&self, attempt: u32, retryable: bool) -> RetryDecision {
        if !retryable || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay_for(attempt))
    }
}
