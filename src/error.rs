//! Error types used by the worker runtime.
//!
//! This module defines the error taxonomy of the worker:
//!
//! - [`StartupError`]: invalid configuration at launch. Fatal: the process must not proceed.
//! - [`ConnectError`]: the hub could not be dialed (the "connect failed" condition). Retryable.
//! - [`SessionError`]: a served connection ended abnormally. Retryable.
//! - [`AppError`]: the embedded application failed to produce a response.
//! - [`RuntimeError`]: the pool itself failed to shut down in time.
//!
//! Every enum provides `as_label` for logs; [`ConnectError`] and [`SessionError`]
//! are contained by the worker loop and never reach the pool.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the pool runtime.
///
/// These represent failures in the orchestration itself,
/// such as a shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some slots were still busy when the pool gave up.
    #[error("shutdown timeout {grace:?} exceeded; busy slots: {busy:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Indices of the slots that did not stop in time.
        busy: Vec<usize>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use hubworker::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), busy: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Fatal configuration errors.
///
/// Raised before any slot starts. The binary reports them and exits non-zero.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StartupError {
    /// The hub address is not a `HOST:PORT` pair.
    #[error("invalid hub address {input:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The application reference is not in `module:symbol` form.
    #[error("invalid application reference {reference:?}: expected MODULE:SYMBOL")]
    InvalidAppReference {
        /// The rejected reference.
        reference: String,
    },

    /// The application reference is well-formed but nothing is registered under it.
    #[error("unknown application {reference:?}; available: {available}")]
    UnknownApp {
        /// The requested reference.
        reference: String,
        /// Comma separated list of known references.
        available: String,
    },

    /// The requested number of worker slots cannot be started.
    #[error("invalid worker count {count}: at least one worker is required")]
    InvalidWorkerCount {
        /// Requested count.
        count: usize,
    },

    /// Any other inconsistent setting.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },

    /// The log subscriber could not be installed.
    #[error("failed to initialize logging: {reason}")]
    Logging {
        /// Underlying error message.
        reason: String,
    },
}

impl StartupError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StartupError::InvalidAddress { .. } => "startup_invalid_address",
            StartupError::InvalidAppReference { .. } => "startup_invalid_app_reference",
            StartupError::UnknownApp { .. } => "startup_unknown_app",
            StartupError::InvalidWorkerCount { .. } => "startup_invalid_worker_count",
            StartupError::InvalidConfig { .. } => "startup_invalid_config",
            StartupError::Logging { .. } => "startup_logging",
        }
    }
}

/// # The hub could not be dialed.
///
/// Always retryable: the worker loop cools down and tries again.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Name resolution failed.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        /// Host that failed to resolve.
        host: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Name resolution succeeded but returned nothing.
    #[error("{host} resolved to no addresses")]
    NoAddresses {
        /// Host that resolved to nothing.
        host: String,
    },

    /// Every resolved address refused or was unreachable.
    #[error("connect to {target} failed: {source}")]
    Connect {
        /// Last address tried.
        target: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The connect attempt did not complete in time.
    #[error("connect to {target} timed out after {timeout:?}")]
    Timeout {
        /// Hub address.
        target: String,
        /// The exceeded timeout.
        timeout: Duration,
    },

    /// The socket connected but could not be configured.
    #[error("failed to set {option} on connection to {target}: {source}")]
    SocketOption {
        /// Option name.
        option: &'static str,
        /// Hub address.
        target: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The connector panicked; the panic was caught by the worker loop.
    #[error("connector panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },
}

impl ConnectError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectError::Resolve { .. } => "connect_resolve",
            ConnectError::NoAddresses { .. } => "connect_no_addresses",
            ConnectError::Connect { .. } => "connect_refused",
            ConnectError::Timeout { .. } => "connect_timeout",
            ConnectError::SocketOption { .. } => "connect_socket_option",
            ConnectError::Panicked { .. } => "connect_panicked",
        }
    }
}

/// # A served connection ended abnormally.
///
/// The connection is discarded and the slot reconnects after a cooldown.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SessionError {
    /// The peer sent bytes that are not a valid HTTP/1.1 request, or the
    /// framing broke mid-exchange.
    #[error("protocol error: {reason}")]
    Protocol {
        /// Description from the HTTP layer.
        reason: String,
    },

    /// Reading from or writing to the connection failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The application failed while handling a request.
    #[error("application failed: {0}")]
    App(#[from] AppError),

    /// The session exceeded its deadline and the connection was dropped.
    #[error("session exceeded deadline of {timeout:?}")]
    Timeout {
        /// The exceeded deadline.
        timeout: Duration,
    },

    /// The handler panicked; the panic was caught by the worker loop.
    #[error("session handler panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use hubworker::SessionError;
    /// use std::time::Duration;
    ///
    /// let err = SessionError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "session_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::Protocol { .. } => "session_protocol",
            SessionError::Io(_) => "session_io",
            SessionError::App(_) => "session_app",
            SessionError::Timeout { .. } => "session_timeout",
            SessionError::Panicked { .. } => "session_panicked",
        }
    }
}

/// # The application failed to produce a response.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// The application returned an error.
    #[error("{message}")]
    Failed {
        /// The application's message.
        message: String,
    },

    /// The application panicked on the blocking pool.
    #[error("application panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },
}

impl AppError {
    /// Convenience constructor for [`AppError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        AppError::Failed {
            message: message.into(),
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let err = ConnectError::NoAddresses {
            host: "hub".into(),
        };
        assert_eq!(err.as_label(), "connect_no_addresses");

        let err = SessionError::from(AppError::failed("boom"));
        assert_eq!(err.as_label(), "session_app");
        assert_eq!(err.to_string(), "application failed: boom");

        let err = StartupError::InvalidWorkerCount { count: 0 };
        assert_eq!(err.as_label(), "startup_invalid_worker_count");
        assert_eq!(
            err.to_string(),
            "invalid worker count 0: at least one worker is required"
        );
    }

    #[test]
    fn test_panic_message_variants() {
        let p: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(p.as_ref()), "static");

        let p: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(p.as_ref()), "owned");

        let p: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(p.as_ref()), "non-string panic payload");
    }
}
