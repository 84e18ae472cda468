//! Error taxonomy for the transfer engine.
//!
//! Every layer (transport, pipeline, retry, reliable stream, scheduler)
//! returns `Fault` so callers can pattern-match on the kind instead of
//! inspecting message text. Faults travel through `std::io::Read` as the
//! inner error of an `io::Error` and are recovered intact on the other side.

use http::StatusCode;
use std::fmt;
use std::io;
use thiserror::Error;

/// Network-level failure class, used by retry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportErrorKind {
    /// Host or proxy name could not be resolved.
    Dns,
    /// TCP/TLS connection could not be established.
    Connect,
    /// Connect or transfer timed out (including low-speed aborts).
    Timeout,
    /// Connection dropped mid-exchange (reset, partial body, empty reply).
    Reset,
    /// Reading the response body (or the request body source) failed.
    Read,
    /// Anything else the transport reports.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Reset => "reset",
            Self::Read => "read",
            Self::Other => "other",
        };
        f.write_str(text)
    }
}

/// Failure of a send, a body read, or a whole transfer.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    /// Network-level failure; retryable by the retry policy and the reliable stream.
    #[error("transport error ({kind}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    /// Non-2xx response from the service.
    #[error("{}", service_message(.status, .error_code, .message))]
    Service {
        status: StatusCode,
        error_code: Option<String>,
        request_id: Option<String>,
        message: String,
    },

    /// The remote resource changed between two reads of the same transfer.
    #[error("resource changed during transfer (ETag {expected:?} became {actual:?})")]
    Consistency {
        expected: Option<String>,
        actual: Option<String>,
    },

    /// Invalid construction input or options.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Local file read/write failed. Not retried.
    #[error("storage: {0}")]
    Storage(String),

    /// Caller-requested cancellation (or an expired deadline).
    #[error("operation cancelled")]
    Cancelled,
}

fn service_message(status: &StatusCode, error_code: &Option<String>, message: &str) -> String {
    let mut out = format!("service returned HTTP {}", status);
    if let Some(code) = error_code {
        out.push_str(&format!(" ({})", code));
    }
    if !message.is_empty() {
        out.push_str(": ");
        out.push_str(message);
    }
    out
}

impl Fault {
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Fault::Transport {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Fault::Config(message.into())
    }

    /// Status code for service faults.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Fault::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Fault::Cancelled)
    }

    /// Short machine-friendly name of the fault kind, for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Fault::Transport { .. } => "transport",
            Fault::Service { .. } => "service",
            Fault::Consistency { .. } => "consistency",
            Fault::Config(_) => "config",
            Fault::Storage(_) => "storage",
            Fault::Cancelled => "cancelled",
        }
    }
}

fn transport_kind_for_io(kind: io::ErrorKind) -> TransportErrorKind {
    match kind {
        io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
        io::ErrorKind::ConnectionRefused => TransportErrorKind::Connect,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => TransportErrorKind::Reset,
        _ => TransportErrorKind::Read,
    }
}

impl From<io::Error> for Fault {
    /// Recovers a `Fault` that was wrapped into an `io::Error`; any other I/O
    /// error on a body stream is a transport read failure.
    fn from(err: io::Error) -> Self {
        let kind = transport_kind_for_io(err.kind());
        let message = err.to_string();
        match err.into_inner() {
            Some(inner) => match inner.downcast::<Fault>() {
                Ok(fault) => *fault,
                Err(other) => Fault::transport(kind, other.to_string()),
            },
            None => Fault::transport(kind, message),
        }
    }
}

impl From<Fault> for io::Error {
    fn from(fault: Fault) -> Self {
        let kind = match &fault {
            Fault::Transport { kind, .. } => match kind {
                TransportErrorKind::Timeout => io::ErrorKind::TimedOut,
                TransportErrorKind::Connect => io::ErrorKind::ConnectionRefused,
                TransportErrorKind::Reset => io::ErrorKind::ConnectionReset,
                _ => io::ErrorKind::Other,
            },
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, fault)
    }
}
