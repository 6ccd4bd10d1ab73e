//! Error types used by the callvisor handler and task bodies.
//!
//! Two layers:
//!
//! - [`RpcError`] — the structured, caller-facing taxonomy. Everything the
//!   RPC layer ever sees is one of these, with a stable numeric code.
//! - [`TaskError`] — what a task body is allowed to fail with. The bootstrap
//!   classifies it into an [`RpcError`] before it crosses the channel.
//!
//! [`FailedCall`] pairs a terminal [`RpcError`] with the log records
//! accumulated up to the failure point; it is what result retrieval returns
//! on the error path.
//!
//! ## Propagation rules
//! - `InvalidParameters` and `InternalMisuse` are returned directly by
//!   `handle()` / `get_result()`, before or outside any execution unit.
//! - Every other kind is captured inside the bootstrap/supervising path,
//!   recorded on the handler, and only surfaces on result retrieval.
//! - `Killed` is never logged through the message channel (the channel may
//!   already be torn down, logging there risks a deadlock).

use std::time::Duration;

use thiserror::Error;

use crate::messages::LogRecord;

/// Structured, caller-facing RPC errors.
///
/// Each variant carries a stable numeric [`code`](RpcError::code) suitable
/// for a JSON-RPC error object.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// Request parameters failed schema validation. Raised before any
    /// execution unit is created.
    #[error("invalid parameters: {message}")]
    InvalidParameters {
        /// Validation failure detail.
        message: String,
    },

    /// Handler API used out of order (e.g. result requested before handle).
    #[error("internal misuse: {message}")]
    InternalMisuse {
        /// What was called out of order.
        message: String,
    },

    /// A known domain failure raised by the task body.
    #[error("{message}")]
    Domain {
        /// Diagnostic detail from the task body.
        message: String,
    },

    /// The execution unit received an external kill request.
    #[error("task killed")]
    Killed,

    /// The call exceeded its configured deadline.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Any unclassified failure, with best-effort diagnostic detail.
    #[error("server error: {message}")]
    ServerError {
        /// Best-effort diagnostic trace.
        message: String,
    },
}

impl RpcError {
    /// Builds an [`RpcError::InvalidParameters`].
    pub fn invalid_params(message: impl Into<String>) -> Self {
        RpcError::InvalidParameters {
            message: message.into(),
        }
    }

    /// Builds an [`RpcError::InternalMisuse`].
    pub fn misuse(message: impl Into<String>) -> Self {
        RpcError::InternalMisuse {
            message: message.into(),
        }
    }

    /// Builds an [`RpcError::ServerError`].
    pub fn server_error(message: impl Into<String>) -> Self {
        RpcError::ServerError {
            message: message.into(),
        }
    }

    /// Stable numeric code for the JSON-RPC error object.
    ///
    /// `InvalidParameters` and `InternalMisuse` use the reserved JSON-RPC
    /// codes; the runtime kinds use the application range.
    pub fn code(&self) -> i64 {
        match self {
            RpcError::InvalidParameters { .. } => -32602,
            RpcError::InternalMisuse { .. } => -32603,
            RpcError::Domain { .. } => 10001,
            RpcError::Killed => 10004,
            RpcError::Timeout { .. } => 10008,
            RpcError::ServerError { .. } => -32000,
        }
    }

    /// Returns a short stable label (snake_case) for logs and status output.
    pub fn as_label(&self) -> &'static str {
        match self {
            RpcError::InvalidParameters { .. } => "invalid_parameters",
            RpcError::InternalMisuse { .. } => "internal_misuse",
            RpcError::Domain { .. } => "domain_error",
            RpcError::Killed => "killed",
            RpcError::Timeout { .. } => "timeout",
            RpcError::ServerError { .. } => "server_error",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// Renders the JSON-RPC error object (`{code, message}`).
    pub fn to_error_object(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.as_message(),
        })
    }
}

/// Errors a task body may fail with.
///
/// The bootstrap entry point classifies these into [`RpcError`]s; an
/// already-structured [`TaskError::Rpc`] is forwarded unchanged.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// An error already shaped for the RPC layer; forwarded as-is.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// A known domain failure (bad input or state the body understands).
    #[error("{message}")]
    Domain {
        /// Diagnostic detail.
        message: String,
    },

    /// An unclassified internal failure.
    #[error("internal error: {message}")]
    Internal {
        /// Best-effort diagnostic detail.
        message: String,
    },
}

impl TaskError {
    /// Builds a [`TaskError::Domain`].
    pub fn domain(message: impl Into<String>) -> Self {
        TaskError::Domain {
            message: message.into(),
        }
    }

    /// Builds a [`TaskError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        TaskError::Internal {
            message: message.into(),
        }
    }
}

/// Terminal failure of a call, paired with the logs accumulated up to the
/// failure point.
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct FailedCall {
    /// The structured error that ended the call.
    pub error: RpcError,
    /// Ordered log records observed before the failure.
    pub logs: Vec<LogRecord>,
}

impl FailedCall {
    pub(crate) fn new(error: RpcError, logs: Vec<LogRecord>) -> Self {
        FailedCall { error, logs }
    }

    /// Failure with no accumulated logs (pre-execution errors).
    pub(crate) fn bare(error: RpcError) -> Self {
        FailedCall {
            error,
            logs: Vec::new(),
        }
    }
}
