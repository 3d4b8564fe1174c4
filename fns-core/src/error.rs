//! Error taxonomy shared by every FNS crate.
//!
//! Mirrors the fine-grained-enum-plus-context idiom the rest of the
//! workspace uses for domain errors: each variant carries just enough
//! context to reconstruct the failure without re-deriving it from logs.

use std::fmt;

/// The error kinds the core raises or propagates, per the remote-call and
/// endpoint-manager failure semantics.
#[derive(thiserror::Error, Debug, Clone)]
pub enum FnsError {
    #[error("endpoint or function not found: {service}/{function}")]
    NotFound { service: String, function: String },

    #[error("endpoint unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("too many requests: {reason}")]
    TooManyRequests { reason: String },

    #[error("too early: {reason}")]
    TooEarly { reason: String },

    #[error("invalid path: {reason}")]
    InvalidPath { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("invalid request versions: {reason}")]
    InvalidRequestVersions { reason: String },

    #[error("signature header missing")]
    SignatureLost,

    #[error("signature verification failed")]
    SignatureUnverified,

    #[error("device-id header is required")]
    DeviceIdRequired,

    #[error("lock `{key}` could not be acquired within {ttl_millis}ms")]
    LockTimeout { key: String, ttl_millis: u64 },

    #[error("{message}")]
    Warning {
        message: String,
        #[source]
        cause: Option<ErrorCause>,
        endpoint: Option<String>,
        function: Option<String>,
        path: Option<String>,
    },

    /// A caller-supplied error encoded across the wire, preserved verbatim
    /// so a remote failure looks the same as a local one to its caller.
    #[error("remote error [{code}]: {message}")]
    Coded { code: String, message: String },
}

/// Type-erased, cloneable error cause. `FnsError` is itself `Clone` (it has
/// to be, since a barrier result is broadcast to many waiters), so the
/// wrapped cause is stored as a shared string rather than a trait object.
#[derive(Debug, Clone)]
pub struct ErrorCause(pub std::sync::Arc<str>);

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ErrorCause {}

impl FnsError {
    pub fn not_found(service: impl Into<String>, function: impl Into<String>) -> Self {
        FnsError::NotFound {
            service: service.into(),
            function: function.into(),
        }
    }

    /// Wraps a local handler failure with endpoint/fn metadata, per the
    /// propagation policy in the error handling design.
    pub fn warning_from<E: std::error::Error>(
        message: impl Into<String>,
        cause: E,
        endpoint: Option<String>,
        function: Option<String>,
        path: Option<String>,
    ) -> Self {
        FnsError::Warning {
            message: message.into(),
            cause: Some(ErrorCause(cause.to_string().into())),
            endpoint,
            function,
            path,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        FnsError::Warning {
            message: message.into(),
            cause: None,
            endpoint: None,
            function: None,
            path: None,
        }
    }

    /// `true` when a remote transport error should flip the originating
    /// function's health flag (status 503, or a transport-level failure).
    pub fn marks_unhealthy(&self) -> bool {
        matches!(self, FnsError::Unavailable { .. })
    }

    /// The stable error code used when this error crosses the wire as a
    /// `CodeError` payload (spec.md's `FC<codeErr>` barrier subtag and the
    /// 555 response status both carry this shape).
    pub fn code(&self) -> &str {
        match self {
            FnsError::NotFound { .. } => "fns.not_found",
            FnsError::Unavailable { .. } => "fns.unavailable",
            FnsError::TooManyRequests { .. } => "fns.too_many_requests",
            FnsError::TooEarly { .. } => "fns.too_early",
            FnsError::InvalidPath { .. } => "fns.invalid_path",
            FnsError::InvalidBody { .. } => "fns.invalid_body",
            FnsError::InvalidRequestVersions { .. } => "fns.invalid_request_versions",
            FnsError::SignatureLost => "fns.signature_lost",
            FnsError::SignatureUnverified => "fns.signature_unverified",
            FnsError::DeviceIdRequired => "fns.device_id_required",
            FnsError::LockTimeout { .. } => "fns.lock_timeout",
            FnsError::Warning { .. } => "fns.warning",
            FnsError::Coded { code, .. } => code,
        }
    }
}

pub type FnsResult<T> = Result<T, FnsError>;
