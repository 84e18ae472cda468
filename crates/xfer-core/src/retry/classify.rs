//! Which failures are worth another attempt.

use super::options::RetryOptions;
use crate::fault::{Fault, TransportErrorKind};
use http::StatusCode;

impl RetryOptions {
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable_status_codes.contains(&status.as_u16())
    }

    pub fn is_retryable_kind(&self, kind: TransportErrorKind) -> bool {
        self.retryable_transport_kinds.contains(&kind)
    }
}

impl Fault {
    /// Transport faults of a configured kind and service faults with a
    /// configured status. Consistency, config, storage and cancellation never are.
    pub fn is_retryable_by(&self, options: &RetryOptions) -> bool {
        match self {
            Fault::Transport { kind, .. } => options.is_retryable_kind(*kind),
            Fault::Service { status, .. } => options.is_retryable_status(*status),
            Fault::Consistency { .. } | Fault::Config(_) | Fault::Storage(_) | Fault::Cancelled => false,
        }
    }
}

/// Map a libcurl error to a transport kind.
pub fn classify_curl_error(e: &curl::Error) -> TransportErrorKind {
    if e.is_operation_timedout() {
        return TransportErrorKind::Timeout;
    }
    if e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
        return TransportErrorKind::Dns;
    }
    if e.is_couldnt_connect() || e.is_ssl_connect_error() {
        return TransportErrorKind::Connect;
    }
    if e.is_recv_error() || e.is_send_error() || e.is_got_nothing() || e.is_partial_file() {
        return TransportErrorKind::Reset;
    }
    if e.is_read_error() {
        return TransportErrorKind::Read;
    }
    TransportErrorKind::Other
}
