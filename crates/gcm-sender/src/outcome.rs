//! Per-recipient and per-round delivery outcomes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Per-recipient error code reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingRegistration,
    InvalidRegistration,
    MismatchSenderId,
    NotRegistered,
    MessageTooBig,
    MissingCollapseKey,
    InvalidTtl,
    Unavailable,
    InternalServerError,
    QuotaExceeded,
    DeviceQuotaExceeded,
    /// A code outside the known vocabulary. Treated as terminal.
    Unknown(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::MissingRegistration => "MissingRegistration",
            Self::InvalidRegistration => "InvalidRegistration",
            Self::MismatchSenderId => "MismatchSenderId",
            Self::NotRegistered => "NotRegistered",
            Self::MessageTooBig => "MessageTooBig",
            Self::MissingCollapseKey => "MissingCollapseKey",
            Self::InvalidTtl => "InvalidTtl",
            Self::Unavailable => "Unavailable",
            Self::InternalServerError => "InternalServerError",
            Self::QuotaExceeded => "QuotaExceeded",
            Self::DeviceQuotaExceeded => "DeviceQuotaExceeded",
            Self::Unknown(code) => code,
        }
    }

    /// Transient gateway-side failures that are safe to resubmit.
    ///
    /// Quota errors are deliberately terminal here: rate-limit backoff is
    /// left to the caller.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::InternalServerError)
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "MissingRegistration" => Self::MissingRegistration,
            "InvalidRegistration" => Self::InvalidRegistration,
            "MismatchSenderId" => Self::MismatchSenderId,
            "NotRegistered" => Self::NotRegistered,
            "MessageTooBig" => Self::MessageTooBig,
            "MissingCollapseKey" => Self::MissingCollapseKey,
            "InvalidTtl" => Self::InvalidTtl,
            "Unavailable" => Self::Unavailable,
            "InternalServerError" => Self::InternalServerError,
            "QuotaExceeded" => Self::QuotaExceeded,
            "DeviceQuotaExceeded" => Self::DeviceQuotaExceeded,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from(code.as_str()))
    }
}

/// Outcome of delivering to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecipientOutcome {
    /// Accepted by the gateway.
    Delivered {
        message_id: String,
        /// Replacement identifier when the submitted one is stale.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        canonical_registration_id: Option<String>,
    },
    /// Rejected for this recipient.
    Failed { error: ErrorCode },
}

impl RecipientOutcome {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self::Delivered {
            message_id: message_id.into(),
            canonical_registration_id: None,
        }
    }

    pub fn failed(error: impl Into<ErrorCode>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Delivered { message_id, .. } => Some(message_id),
            Self::Failed { .. } => None,
        }
    }

    pub fn canonical_registration_id(&self) -> Option<&str> {
        match self {
            Self::Delivered {
                canonical_registration_id,
                ..
            } => canonical_registration_id.as_deref(),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorCode> {
        match self {
            Self::Failed { error } => Some(error),
            Self::Delivered { .. } => None,
        }
    }

    /// Whether the recipient should be resubmitted in the next round.
    pub fn is_retriable(&self) -> bool {
        self.error().is_some_and(ErrorCode::is_retriable)
    }
}

impl fmt::Display for RecipientOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered {
                message_id,
                canonical_registration_id: Some(canonical),
            } => write!(f, "[ messageId={message_id} canonicalRegistrationId={canonical} ]"),
            Self::Delivered { message_id, .. } => write!(f, "[ messageId={message_id} ]"),
            Self::Failed { error } => write!(f, "[ errorCode={error} ]"),
        }
    }
}

/// Result of one network round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Gateway-issued round identifier. Only meaningful for audit.
    pub multicast_id: i64,
    pub success: u32,
    pub failure: u32,
    pub canonical_ids: u32,
    /// One entry per submitted recipient, in submission order.
    pub outcomes: Vec<RecipientOutcome>,
}

/// Final result of a multicast call, possibly spanning several rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub success: u32,
    pub failure: u32,
    pub canonical_ids: u32,
    /// Identifier of the first round that produced an outcome.
    pub multicast_id: i64,
    /// Identifiers of the rounds after the first one.
    pub retry_multicast_ids: Vec<i64>,
    /// Outcomes in the caller's recipient order.
    pub outcomes: Vec<RecipientOutcome>,
}

impl DeliveryResult {
    pub fn total(&self) -> u32 {
        self.success + self.failure
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MulticastResult(multicast_id={}, total={}, success={}, failure={}, canonical_ids={}",
            self.multicast_id,
            self.total(),
            self.success,
            self.failure,
            self.canonical_ids
        )?;
        if !self.retry_multicast_ids.is_empty() {
            write!(f, ", retry_multicast_ids={:?}", self.retry_multicast_ids)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_classification() {
        assert!(ErrorCode::Unavailable.is_retriable());
        assert!(ErrorCode::InternalServerError.is_retriable());

        for terminal in [
            "MissingRegistration",
            "InvalidRegistration",
            "MismatchSenderId",
            "NotRegistered",
            "MessageTooBig",
            "MissingCollapseKey",
            "InvalidTtl",
            "QuotaExceeded",
            "DeviceQuotaExceeded",
            "SomethingNew",
        ] {
            assert!(!ErrorCode::from(terminal).is_retriable(), "{terminal}");
        }
    }

    #[test]
    fn error_code_round_trips_unknown() {
        let code = ErrorCode::from("SomethingNew");
        assert_eq!(code, ErrorCode::Unknown("SomethingNew".to_string()));
        assert_eq!(code.to_string(), "SomethingNew");
        assert_eq!(ErrorCode::from("NotRegistered").as_str(), "NotRegistered");
    }

    #[test]
    fn outcome_accessors() {
        let delivered = RecipientOutcome::Delivered {
            message_id: "m1".to_string(),
            canonical_registration_id: Some("new".to_string()),
        };
        assert!(delivered.is_delivered());
        assert_eq!(delivered.message_id(), Some("m1"));
        assert_eq!(delivered.canonical_registration_id(), Some("new"));
        assert!(!delivered.is_retriable());

        let failed = RecipientOutcome::failed("Unavailable");
        assert!(!failed.is_delivered());
        assert_eq!(failed.error(), Some(&ErrorCode::Unavailable));
        assert!(failed.is_retriable());
    }

    #[test]
    fn outcome_json_shape() {
        let value = serde_json::to_value(RecipientOutcome::failed("NotRegistered")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "status": "failed", "error": "NotRegistered" })
        );

        let value = serde_json::to_value(RecipientOutcome::delivered("0:1")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "status": "delivered", "message_id": "0:1" })
        );
    }
}
