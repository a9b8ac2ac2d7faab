//! Request/response messages exchanged with the recognition service.
//!
//! Every message is a shared [`Envelope`] plus exactly one [`Payload`]
//! variant. The envelope carries the generation and stroke count of the
//! model that produced the request, so any response can be correlated back
//! to it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::{Domain, InkComponent, RecognizedContent, StrokeRange};
use crate::error::Result;
use crate::model::{CreationTime, DocumentModel};
use crate::settings::SessionConfig;

/// Discriminator of a message, mirroring the payload tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Init,
    Start,
    Continue,
    Reset,
    Cancel,
    Ack,
    Result,
    Error,
}

impl MessageKind {
    /// Whether this kind travels from the client to the service
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            MessageKind::Init
                | MessageKind::Start
                | MessageKind::Continue
                | MessageKind::Reset
                | MessageKind::Cancel
        )
    }
}

/// Service-side error classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidApplicationKey,
    InvalidRequest,
    UnsupportedDomain,
    SessionExpired,
    Internal,
    #[serde(other)]
    Unknown,
}

/// Fields common to every message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub request_id: Uuid,
    pub domain: Domain,
    pub generation: CreationTime,
    pub stroke_count: usize,
}

impl Envelope {
    pub fn for_model(domain: Domain, model: &DocumentModel) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            domain,
            generation: model.creation_time(),
            stroke_count: model.stroke_count(),
        }
    }
}

/// Per-kind message body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Open a recognition session
    Init {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        application_key: Option<String>,
    },
    /// First submission after init or reset
    Start {
        parameters: serde_json::Value,
        components: Vec<InkComponent>,
    },
    /// Incremental submission of strokes not sent before
    Continue { components: Vec<InkComponent> },
    /// Drop all ink the service holds for this session
    Reset,
    /// Abandon the session
    Cancel,
    /// Acknowledgement of init/reset
    Ack,
    /// Recognized content for the request
    Result {
        content: RecognizedContent,
        range: StrokeRange,
    },
    /// Request failed on the service side
    Error { code: ErrorCode, detail: String },
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Init { .. } => MessageKind::Init,
            Payload::Start { .. } => MessageKind::Start,
            Payload::Continue { .. } => MessageKind::Continue,
            Payload::Reset => MessageKind::Reset,
            Payload::Cancel => MessageKind::Cancel,
            Payload::Ack => MessageKind::Ack,
            Payload::Result { .. } => MessageKind::Result,
            Payload::Error { .. } => MessageKind::Error,
        }
    }
}

/// A complete protocol message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolMessage {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(flatten)]
    pub payload: Payload,
}

impl ProtocolMessage {
    pub fn new(envelope: Envelope, payload: Payload) -> Self {
        Self { envelope, payload }
    }

    pub fn init(domain: Domain, model: &DocumentModel, application_key: Option<String>) -> Self {
        Self::new(
            Envelope::for_model(domain, model),
            Payload::Init { application_key },
        )
    }

    /// Build the submission for every stroke from `from` onward.
    ///
    /// Nothing acknowledged yet (`from == 0`) yields a `start` carrying the
    /// configured parameters; otherwise a `continue` with the delta only.
    pub fn submission(config: &SessionConfig, model: &DocumentModel, from: usize) -> Self {
        let components: Vec<InkComponent> = model
            .strokes_from(from)
            .iter()
            .map(InkComponent::from)
            .collect();
        let payload = if from == 0 {
            Payload::Start {
                parameters: config.recognition.parameters.clone(),
                components,
            }
        } else {
            Payload::Continue { components }
        };
        Self::new(
            Envelope::for_model(config.recognition.domain, model),
            payload,
        )
    }

    pub fn reset(domain: Domain, model: &DocumentModel) -> Self {
        Self::new(Envelope::for_model(domain, model), Payload::Reset)
    }

    /// Response acknowledging `request`
    pub fn ack(request: &Envelope) -> Self {
        Self::new(request.clone(), Payload::Ack)
    }

    /// Response carrying recognized content for `request`
    pub fn result(request: &Envelope, content: RecognizedContent, range: StrokeRange) -> Self {
        Self::new(request.clone(), Payload::Result { content, range })
    }

    /// Response reporting a failure of `request`
    pub fn error(request: &Envelope, code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::new(
            request.clone(),
            Payload::Error {
                code,
                detail: detail.into(),
            },
        )
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn request_id(&self) -> Uuid {
        self.envelope.request_id
    }

    /// Ink carried by a start/continue message; empty for every other kind.
    pub fn components(&self) -> &[InkComponent] {
        match &self.payload {
            Payload::Start { components, .. } | Payload::Continue { components } => components,
            _ => &[],
        }
    }

    /// Whether this message was produced from `model`'s generation and stroke count.
    pub fn correlates_with(&self, model: &DocumentModel) -> bool {
        self.envelope.generation == model.creation_time()
            && self.envelope.stroke_count == model.stroke_count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InkError;
    use crate::model::{ModelParams, PenStyle, Point};

    fn model_with_strokes(count: usize) -> DocumentModel {
        let mut model = DocumentModel::new(ModelParams::default());
        for i in 0..count {
            let x = i as f64 * 10.0;
            model.init_pending_stroke(Point::new(x, 0.0, 0), PenStyle::default());
            model.end_pending_stroke(Point::new(x + 5.0, 5.0, 1));
        }
        model
    }

    #[test]
    fn test_submission_from_zero_is_start_with_parameters() {
        let mut config = SessionConfig::default();
        config.recognition.parameters = serde_json::json!({"language": "en_US"});
        let model = model_with_strokes(2);

        let message = ProtocolMessage::submission(&config, &model, 0);
        assert_eq!(message.kind(), MessageKind::Start);
        assert_eq!(message.components().len(), 2);
        assert!(message.correlates_with(&model));
        match &message.payload {
            Payload::Start { parameters, .. } => assert_eq!(parameters["language"], "en_US"),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_submission_after_ack_is_delta_only() {
        let config = SessionConfig::default();
        let model = model_with_strokes(3);

        let message = ProtocolMessage::submission(&config, &model, 2);
        assert_eq!(message.kind(), MessageKind::Continue);
        assert_eq!(message.components().len(), 1);
        assert_eq!(message.envelope.stroke_count, 3);
    }

    #[test]
    fn test_wire_shape_is_flat() {
        let model = model_with_strokes(1);
        let message = ProtocolMessage::reset(Domain::Math, &model);
        let json: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "reset");
        assert_eq!(json["domain"], "math");
        assert_eq!(json["stroke_count"], 1);
        assert_eq!(json["generation"], model.creation_time().as_micros());
    }

    #[test]
    fn test_parse_result_response() {
        let text = r#"{
            "type": "result",
            "request_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "domain": "text",
            "generation": 42,
            "stroke_count": 2,
            "content": {"domain": "text", "label": "hi", "candidates": [{"label": "hi", "score": 0.9}]},
            "range": {"start": 0, "end": 2}
        }"#;

        let message = ProtocolMessage::from_json(text).unwrap();
        assert_eq!(message.kind(), MessageKind::Result);
        assert!(!message.kind().is_request());
        assert_eq!(message.envelope.stroke_count, 2);
        match message.payload {
            Payload::Result { content, range } => {
                assert_eq!(content.summary(), "hi");
                assert_eq!(range, StrokeRange::new(0, 2));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_unknown_error_code_is_tolerated() {
        let text = r#"{
            "type": "error",
            "request_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "domain": "math",
            "generation": 1,
            "stroke_count": 0,
            "code": "quota_exceeded",
            "detail": "try later"
        }"#;

        let message = ProtocolMessage::from_json(text).unwrap();
        assert_eq!(
            message.payload,
            Payload::Error {
                code: ErrorCode::Unknown,
                detail: "try later".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_json_is_protocol_error() {
        let err = ProtocolMessage::from_json("{\"type\": \"bogus\"}").unwrap_err();
        assert!(matches!(err, InkError::Protocol(_)));
    }
}
