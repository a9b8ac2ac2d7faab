use serde::Serialize;
use thiserror::Error;

use crate::model::StaleReason;
use crate::settings::TriggerMode;

#[derive(Debug, Clone, Error)]
pub enum InkError {
    #[error("Trigger mode {requested} is not supported by the bound recognizer")]
    UnsupportedTrigger { requested: TriggerMode },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Recognition result discarded: {0}")]
    StaleResult(StaleReason),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    Timeout { request_id: String, timeout_ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InkError {
    /// Whether this error is reported to the host as a connection failure
    /// (as opposed to a recognition failure).
    pub fn is_connection_error(&self) -> bool {
        matches!(self, InkError::Connection(_) | InkError::Timeout { .. })
    }
}

impl From<serde_json::Error> for InkError {
    fn from(err: serde_json::Error) -> Self {
        InkError::Protocol(err.to_string())
    }
}

// Carried as the `detail` of host error events
impl Serialize for InkError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_as_display_string() {
        let err = InkError::Recognition("backend refused".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Recognition error: backend refused\"");
    }

    #[test]
    fn test_connection_classification() {
        assert!(InkError::Connection("down".into()).is_connection_error());
        assert!(InkError::Timeout {
            request_id: "r1".into(),
            timeout_ms: 10
        }
        .is_connection_error());
        assert!(!InkError::Recognition("bad ink".into()).is_connection_error());
    }

    #[test]
    fn test_unsupported_trigger_message() {
        let err = InkError::UnsupportedTrigger {
            requested: TriggerMode::QuietPeriod,
        };
        assert_eq!(
            err.to_string(),
            "Trigger mode quiet_period is not supported by the bound recognizer"
        );
    }

    #[test]
    fn test_clone_keeps_stale_reason() {
        let err = InkError::StaleResult(StaleReason::StrokeCountMismatch { live: 2, result: 1 });
        match err.clone() {
            InkError::StaleResult(reason) => assert_eq!(
                reason,
                StaleReason::StrokeCountMismatch { live: 2, result: 1 }
            ),
            other => panic!("unexpected clone: {other:?}"),
        }
    }
}
