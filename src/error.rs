//! Error types used by the servicevisor runtime, its services and loaders.
//!
//! This module defines the error families of the crate:
//!
//! - [`AddressError`]: malformed or mismatched service addresses.
//! - [`PayloadError`]: event payload could not be built.
//! - [`ServiceError`]: errors recorded by individual services.
//! - [`TransitionError`]: illegal service lifecycle transition.
//! - [`SessionError`]: service registry and session failures.
//! - [`LoaderError`]: failures observed while loading a set of services.
//! - [`CronError`]: schedule parsing and job registration failures.
//! - [`RuntimeError`]: session teardown failures.
//!
//! Every type provides `as_label` (a short stable snake_case label for logs/metrics).
//! All errors are `Clone`, so a finished loader can hand out its result repeatedly.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::services::ServiceState;

/// # Invalid service address.
///
/// Raised by [`Address::parse`](crate::Address::parse) and
/// [`Address::resolve_service`](crate::Address::resolve_service).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Address does not use the `svc://` scheme.
    #[error("invalid address {input:?}: expected scheme {expected:?}, found {found:?}")]
    SchemeMismatch {
        input: String,
        expected: &'static str,
        found: String,
    },

    /// Address could not be parsed into `scheme://host/instance[/path]`.
    #[error("invalid address {input:?}: {reason}")]
    Malformed { input: String, reason: String },

    /// A path segment contains characters outside `[A-Za-z0-9._-]`.
    #[error("invalid address segment {segment:?} in {input:?}")]
    InvalidSegment { input: String, segment: String },

    /// Absolute service reference points at another host or instance.
    #[error("invalid address {input:?}: does not belong to {host}")]
    ForeignHost { input: String, host: String },
}

impl AddressError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AddressError::SchemeMismatch { .. } => "address_scheme_mismatch",
            AddressError::Malformed { .. } => "address_malformed",
            AddressError::InvalidSegment { .. } => "address_invalid_segment",
            AddressError::ForeignHost { .. } => "address_foreign_host",
        }
    }
}

/// # Event payload could not be built.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload keys must not be empty.
    #[error("payload key must not be empty")]
    EmptyKey,

    /// Payload already holds a value under this key.
    #[error("payload key {0:?} already set")]
    DuplicateKey(String),
}

impl PayloadError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PayloadError::EmptyKey => "payload_empty_key",
            PayloadError::DuplicateKey(_) => "payload_duplicate_key",
        }
    }
}

/// # Errors produced by services and actions.
///
/// Recorded (timestamped) on the owning service's status, and returned by
/// cron [`Action`](crate::Action)s.
///
/// # Example
/// ```
/// use servicevisor::ServiceError;
///
/// let retryable = ServiceError::Fail { error: "boom".into() };
/// assert!(retryable.is_retryable());
///
/// let fatal = ServiceError::Fatal { error: "nope".into() };
/// assert!(!fatal.is_retryable());
/// assert_eq!(fatal.as_label(), "service_fatal");
/// ```
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Start exceeded `services.start_timeout`.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable fatal error.
    #[error("fatal error: {error}")]
    Fatal { error: String },

    /// Execution failed but may succeed if retried.
    #[error("execution failed: {error}")]
    Fail { error: String },

    /// Execution was cancelled because the session or service was stopped.
    #[error("context cancelled")]
    Canceled,
}

impl ServiceError {
    /// Shorthand for [`ServiceError::Fail`].
    pub fn fail(error: impl fmt::Display) -> Self {
        ServiceError::Fail {
            error: error.to_string(),
        }
    }

    /// Shorthand for [`ServiceError::Fatal`].
    pub fn fatal(error: impl fmt::Display) -> Self {
        ServiceError::Fatal {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Timeout { .. } => "service_timeout",
            ServiceError::Fatal { .. } => "service_fatal",
            ServiceError::Fail { .. } => "service_failed",
            ServiceError::Canceled => "service_canceled",
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `true` for [`ServiceError::Fail`] and [`ServiceError::Timeout`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Fail { .. } | ServiceError::Timeout { .. })
    }
}

/// Illegal service lifecycle transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("service {service}: illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub service: String,
    pub from: ServiceState,
    pub to: ServiceState,
}

/// # Errors produced by the session and its service registry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No service is registered under this address.
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// A service is already registered under this address.
    #[error("service already registered: {0}")]
    DuplicateService(String),

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    /// The session has been shut down.
    #[error("session destroyed")]
    Destroyed,
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::ServiceNotFound(_) => "session_service_not_found",
            SessionError::DuplicateService(_) => "session_duplicate_service",
            SessionError::InvalidAddress(_) => "session_invalid_address",
            SessionError::Destroyed => "session_destroyed",
        }
    }
}

/// # Errors observed by a [`ServiceLoader`](crate::ServiceLoader).
///
/// A failed load usually produces several errors; they are returned together as
/// [`LoaderError::Joined`], displayed one per line.
///
/// # Example
/// ```
/// use servicevisor::LoaderError;
///
/// let err = LoaderError::Joined(vec![
///     LoaderError::NotLoadedOnTime { address: "svc://h/i/db".into() },
///     LoaderError::DeadlineExceeded { timeout: std::time::Duration::from_secs(1) },
/// ]);
/// assert_eq!(err.iter().count(), 2);
/// assert!(err.to_string().contains("svc://h/i/db"));
/// ```
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    /// Host address reference could not be parsed.
    #[error("loader requires valid host address, got {address:?}")]
    InvalidHost { address: String },

    /// Construction recorded errors; no load was attempted.
    #[error("loader initialization failed")]
    InitFailed,

    /// Same canonical address was queued twice.
    #[error("duplicated service request {address}")]
    DuplicateRequest { address: String },

    /// The session does not know a requested service.
    #[error("service lookup failed: {0}")]
    Lookup(#[from] SessionError),

    /// An error recorded by a queued service.
    #[error("service {address}: {error}")]
    Service {
        address: String,
        error: ServiceError,
    },

    /// One or more queued services recorded errors before the load finished.
    #[error("failed to load required services {}", .addresses.join(", "))]
    StartFailed { addresses: Vec<String> },

    /// A queued service was still not running when the deadline elapsed.
    #[error("service did not load on time {address}")]
    NotLoadedOnTime { address: String },

    /// Loader deadline elapsed.
    #[error("loader deadline exceeded after {timeout:?}")]
    DeadlineExceeded { timeout: Duration },

    /// The session was shut down while services were loading.
    #[error("session destroyed while loading services")]
    SessionDestroyed,

    /// Result requested before the completion signal fired.
    #[error("service loader error checked before loader finished")]
    NotFinished,

    /// Several errors, in the order they were recorded.
    #[error("{}", JoinDisplay(.0))]
    Joined(Vec<LoaderError>),
}

impl LoaderError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LoaderError::InvalidAddress(_) => "loader_invalid_address",
            LoaderError::InvalidHost { .. } => "loader_invalid_host",
            LoaderError::InitFailed => "loader_init_failed",
            LoaderError::DuplicateRequest { .. } => "loader_duplicate_request",
            LoaderError::Lookup(_) => "loader_lookup_failed",
            LoaderError::Service { .. } => "loader_service_error",
            LoaderError::StartFailed { .. } => "loader_start_failed",
            LoaderError::NotLoadedOnTime { .. } => "loader_not_loaded_on_time",
            LoaderError::DeadlineExceeded { .. } => "loader_deadline_exceeded",
            LoaderError::SessionDestroyed => "loader_session_destroyed",
            LoaderError::NotFinished => "loader_not_finished",
            LoaderError::Joined(_) => "loader_joined",
        }
    }

    /// Joins errors: `None` when empty, the error itself when alone.
    pub fn join(mut errors: Vec<LoaderError>) -> Option<LoaderError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(LoaderError::Joined(errors)),
        }
    }

    /// Iterates over the leaf errors, flattening nested [`LoaderError::Joined`].
    pub fn iter(&self) -> Box<dyn Iterator<Item = &LoaderError> + '_> {
        match self {
            LoaderError::Joined(errors) => Box::new(errors.iter().flat_map(|e| e.iter())),
            other => Box::new(std::iter::once(other)),
        }
    }
}

struct JoinDisplay<'a>(&'a [LoaderError]);

impl fmt::Display for JoinDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// # Cron scheduling errors.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CronError {
    /// Schedule expression could not be parsed.
    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidExpression { expr: String, reason: String },

    /// No job with this id is registered with the engine.
    #[error("cron job not found: {0}")]
    UnknownJob(u64),

    /// The engine was stopped; no further jobs can run.
    #[error("cron engine stopped")]
    Stopped,
}

impl CronError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CronError::InvalidExpression { .. } => "cron_invalid_expression",
            CronError::UnknownJob(_) => "cron_unknown_job",
            CronError::Stopped => "cron_stopped",
        }
    }
}

/// # Errors produced by session teardown.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some services were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Addresses of services that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_display_is_one_error_per_line() {
        let err = LoaderError::Joined(vec![
            LoaderError::InvalidHost {
                address: "nope".into(),
            },
            LoaderError::InitFailed,
        ]);
        assert_eq!(
            err.to_string(),
            "loader requires valid host address, got \"nope\"\nloader initialization failed"
        );
    }

    #[test]
    fn join_collapses_single_error() {
        assert_eq!(LoaderError::join(vec![]), None);
        assert_eq!(
            LoaderError::join(vec![LoaderError::InitFailed]),
            Some(LoaderError::InitFailed)
        );
    }

    #[test]
    fn iter_flattens_nested_joins() {
        let nested = LoaderError::Joined(vec![
            LoaderError::InitFailed,
            LoaderError::Joined(vec![LoaderError::NotFinished, LoaderError::SessionDestroyed]),
        ]);
        let labels: Vec<_> = nested.iter().map(|e| e.as_label()).collect();
        assert_eq!(
            labels,
            vec![
                "loader_init_failed",
                "loader_not_finished",
                "loader_session_destroyed"
            ]
        );
    }

    #[test]
    fn start_failed_lists_addresses() {
        let err = LoaderError::StartFailed {
            addresses: vec!["svc://h/i/a".into(), "svc://h/i/b".into()],
        };
        assert_eq!(
            err.to_string(),
            "failed to load required services svc://h/i/a, svc://h/i/b"
        );
    }
}
