//! Sender error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, GcmError>;

/// Errors that abort a delivery call.
///
/// Per-recipient failures are not errors: they are reported as
/// [`RecipientOutcome::Failed`](crate::RecipientOutcome::Failed) inside a
/// successful [`DeliveryResult`](crate::DeliveryResult).
#[derive(Error, Debug)]
pub enum GcmError {
    /// The gateway answered with a non-200 status. Never retried.
    #[error("gateway rejected request with status {status}: {body}")]
    InvalidRequest { status: u16, body: String },

    /// The gateway answered 200 but the body could not be decoded.
    #[error("malformed gateway response ({reason}): {body}")]
    MalformedResponse { reason: String, body: String },

    /// Every round was indeterminate (network failure, timeout).
    #[error("gateway unreachable after {attempts} attempts")]
    Unreachable { attempts: u32 },

    /// The caller cancelled the call.
    #[error("delivery cancelled")]
    Cancelled,

    /// Internal consistency violation, e.g. the gateway answered for a
    /// different number of recipients than it was asked about.
    #[error("internal error: {0}")]
    Internal(String),

    /// The request was rejected before any network round.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GcmError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn malformed(reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// Whether the gateway explicitly rejected the request or its answer
    /// violated the protocol.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. } | Self::MalformedResponse { .. }
        )
    }

    /// Whether this is an internal consistency violation rather than
    /// something the gateway reported.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// HTTP status carried by an [`InvalidRequest`](Self::InvalidRequest).
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidRequest { status, .. } => Some(*status),
            _ => None,
        }
    }
}
