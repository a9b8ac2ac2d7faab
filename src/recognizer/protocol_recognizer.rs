//! Recognizer speaking the request/response protocol over a [`MessageTransport`].
//!
//! Each request registers a oneshot sender under its request id; a
//! dispatcher task routes inbound responses to the matching sender. Responses
//! for unknown or already-answered ids are logged and dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::context::RecognizerContext;
use super::transport::MessageTransport;
use super::{Recognizer, RecognizerInfo};
use crate::error::{InkError, Result};
use crate::model::{DocumentModel, RecognitionResult};
use crate::protocol::{ErrorCode, Payload, ProtocolMessage};
use crate::settings::{SessionConfig, TriggerMode};

type PendingResponses = Arc<RwLock<HashMap<Uuid, oneshot::Sender<ProtocolMessage>>>>;

pub struct ProtocolRecognizer {
    transport: Arc<dyn MessageTransport>,
    pending: PendingResponses,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    triggers: HashSet<TriggerMode>,
}

impl ProtocolRecognizer {
    /// A recognizer supporting every trigger mode.
    pub fn new(transport: Arc<dyn MessageTransport>) -> Self {
        Self {
            transport,
            pending: Arc::new(RwLock::new(HashMap::new())),
            dispatcher: Mutex::new(None),
            triggers: [
                TriggerMode::PenUp,
                TriggerMode::QuietPeriod,
                TriggerMode::Demand,
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Restrict the advertised trigger modes.
    pub fn with_triggers(mut self, triggers: impl IntoIterator<Item = TriggerMode>) -> Self {
        self.triggers = triggers.into_iter().collect();
        self
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    /// Send `message` and wait for the response carrying the same request id.
    async fn exchange(&self, message: ProtocolMessage, timeout: Duration) -> Result<ProtocolMessage> {
        let request_id = message.request_id();
        let kind = message.kind();
        let (tx, rx) = oneshot::channel();
        self.pending.write().insert(request_id, tx);

        tracing::debug!("[recognizer] -> {:?} {}", kind, request_id);
        if let Err(e) = self.transport.send(message).await {
            self.pending.write().remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => {
                tracing::debug!("[recognizer] <- {:?} {}", response.kind(), request_id);
                Ok(response)
            }
            Ok(Err(_)) => Err(InkError::Connection(format!(
                "connection closed before {:?} {} was answered",
                kind, request_id
            ))),
            Err(_) => {
                self.pending.write().remove(&request_id);
                tracing::warn!(
                    "[recognizer] {:?} {} timed out after {}ms",
                    kind,
                    request_id,
                    timeout.as_millis()
                );
                Err(InkError::Timeout {
                    request_id: request_id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Whether the inbound stream is still being dispatched
    pub fn is_connected(&self) -> bool {
        self.dispatcher
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn stop_dispatcher(&self) {
        if let Some(handle) = self.dispatcher.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for ProtocolRecognizer {
    fn drop(&mut self) {
        self.stop_dispatcher();
    }
}

/// Route inbound responses to their waiting requests until the stream ends.
async fn dispatch_responses(
    mut inbound: mpsc::UnboundedReceiver<ProtocolMessage>,
    pending: PendingResponses,
) {
    while let Some(message) = inbound.recv().await {
        if message.kind().is_request() {
            tracing::warn!(
                "[recognizer] ignoring inbound {:?} message {}",
                message.kind(),
                message.request_id()
            );
            continue;
        }

        let request_id = message.request_id();
        let waiter = pending.write().remove(&request_id);
        match waiter {
            Some(tx) => {
                if tx.send(message).is_err() {
                    tracing::debug!("[recognizer] requester for {} is gone", request_id);
                }
            }
            None => {
                tracing::warn!(
                    "[recognizer] dropping {:?} for unknown or completed request {}",
                    message.kind(),
                    request_id
                );
            }
        }
    }

    tracing::info!("[recognizer] inbound stream closed");
    // Dropping the senders fails every waiting request
    pending.write().clear();
}

fn service_error(code: ErrorCode, detail: String) -> InkError {
    match code {
        ErrorCode::InvalidApplicationKey | ErrorCode::SessionExpired => {
            InkError::Connection(format!("{:?}: {}", code, detail))
        }
        _ => InkError::Recognition(format!("{:?}: {}", code, detail)),
    }
}

fn expect_ack(response: ProtocolMessage) -> Result<()> {
    match response.payload {
        Payload::Ack => Ok(()),
        Payload::Error { code, detail } => Err(service_error(code, detail)),
        other => Err(InkError::Protocol(format!(
            "expected ack, got {:?}",
            other.kind()
        ))),
    }
}

#[async_trait]
impl Recognizer for ProtocolRecognizer {
    fn info(&self) -> RecognizerInfo {
        RecognizerInfo::new("protocol", self.triggers.iter().copied())
    }

    async fn init(
        &self,
        config: &SessionConfig,
        model: DocumentModel,
        _context: &RecognizerContext,
    ) -> Result<DocumentModel> {
        // Re-initialisation (new context, new settings) reuses the open link
        if !self.is_connected() {
            let inbound = self.transport.connect().await?;
            let handle = tokio::spawn(dispatch_responses(inbound, self.pending.clone()));
            if let Some(previous) = self.dispatcher.lock().replace(handle) {
                previous.abort();
            }
        }

        let message = ProtocolMessage::init(
            config.recognition.domain,
            &model,
            config.server.application_key.clone(),
        );
        let response = self.exchange(message, config.request_timeout()).await?;
        expect_ack(response)?;

        tracing::info!(
            "[recognizer] session initialized ({}://{}, domain={})",
            config.server.scheme,
            config.server.host,
            config.recognition.domain
        );
        Ok(model)
    }

    async fn recognize(
        &self,
        config: &SessionConfig,
        model: DocumentModel,
        context: &RecognizerContext,
    ) -> Result<DocumentModel> {
        let message = context.outstanding.clone().ok_or_else(|| {
            InkError::Internal("recognize called without an outstanding request".to_string())
        })?;
        if !message.correlates_with(&model) {
            return Err(InkError::Internal(format!(
                "outstanding request {} does not match the model snapshot",
                message.request_id()
            )));
        }

        let response = self.exchange(message, config.request_timeout()).await?;
        match response.payload {
            Payload::Result { content, range } => {
                Ok(model.with_recognition_result(RecognitionResult { content, range }))
            }
            Payload::Error { code, detail } => Err(service_error(code, detail)),
            other => Err(InkError::Protocol(format!(
                "expected result, got {:?}",
                other.kind()
            ))),
        }
    }

    async fn reset(
        &self,
        config: &SessionConfig,
        model: DocumentModel,
        _context: &RecognizerContext,
    ) -> Result<DocumentModel> {
        let message = ProtocolMessage::reset(config.recognition.domain, &model);
        let response = self.exchange(message, config.request_timeout()).await?;
        expect_ack(response)?;
        Ok(model)
    }

    fn close(&self, _config: &SessionConfig, _model: &DocumentModel, context: &RecognizerContext) {
        self.stop_dispatcher();
        self.transport.disconnect();
        let dropped = {
            let mut pending = self.pending.write();
            let count = pending.len();
            pending.clear();
            count
        };
        tracing::info!(
            "[recognizer] closed context {} ({} pending requests dropped)",
            context.id,
            dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelParams, PenStyle, Point};
    use crate::protocol::{Envelope, MessageKind, RecognizedContent, StrokeRange};
    use crate::recognizer::context::SharedContext;
    use crate::recognizer::transport::{ChannelTransport, TransportPeer};

    fn model_with_strokes(count: usize) -> DocumentModel {
        let mut model = DocumentModel::new(ModelParams::default());
        for i in 0..count {
            let x = i as f64;
            model.init_pending_stroke(Point::new(x, 0.0, 0), PenStyle::default());
            model.end_pending_stroke(Point::new(x, 1.0, 1));
        }
        model
    }

    fn recognizer() -> (ProtocolRecognizer, TransportPeer) {
        let (transport, peer) = ChannelTransport::pair();
        (ProtocolRecognizer::new(Arc::new(transport)), peer)
    }

    /// Answer init with ack, then hand the peer back to the test.
    async fn init(
        recognizer: &ProtocolRecognizer,
        mut peer: TransportPeer,
        config: &SessionConfig,
        context: &SharedContext,
    ) -> TransportPeer {
        let model = DocumentModel::new(ModelParams::default());
        let snapshot = context.snapshot();
        let server = tokio::spawn(async move {
            let request = peer.requests.recv().await.unwrap();
            assert_eq!(request.kind(), MessageKind::Init);
            peer.responses
                .send(ProtocolMessage::ack(&request.envelope))
                .unwrap();
            peer
        });
        recognizer.init(config, model, &snapshot).await.unwrap();
        server.await.unwrap()
    }

    #[tokio::test]
    async fn test_recognize_matches_response_by_request_id() {
        let config = SessionConfig::default();
        let context = SharedContext::new();
        let (recognizer, peer) = recognizer();
        let mut peer = init(&recognizer, peer, &config, &context).await;

        let mut model = model_with_strokes(2);
        let snapshot = context.begin_request(&config, &mut model);

        let server = tokio::spawn(async move {
            let request = peer.requests.recv().await.unwrap();
            assert_eq!(request.kind(), MessageKind::Start);
            // A stray response first; it must be ignored
            let stray = Envelope::for_model(request.envelope.domain, &model_with_strokes(0));
            peer.responses.send(ProtocolMessage::ack(&stray)).unwrap();
            peer.responses
                .send(ProtocolMessage::result(
                    &request.envelope,
                    RecognizedContent::text("ok"),
                    StrokeRange::new(0, 2),
                ))
                .unwrap();
            peer
        });

        let result = recognizer.recognize(&config, model, &snapshot).await.unwrap();
        assert_eq!(result.positions().last_received, 2);
        assert_eq!(result.result().unwrap().content.summary(), "ok");
        assert_eq!(recognizer.pending_count(), 0);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_service_error_becomes_recognition_error() {
        let config = SessionConfig::default();
        let context = SharedContext::new();
        let (recognizer, peer) = recognizer();
        let mut peer = init(&recognizer, peer, &config, &context).await;

        let mut model = model_with_strokes(1);
        let snapshot = context.begin_request(&config, &mut model);
        tokio::spawn(async move {
            let request = peer.requests.recv().await.unwrap();
            peer.responses
                .send(ProtocolMessage::error(
                    &request.envelope,
                    ErrorCode::UnsupportedDomain,
                    "no such domain",
                ))
                .unwrap();
            peer
        });

        let err = recognizer.recognize(&config, model, &snapshot).await.unwrap_err();
        assert!(matches!(err, InkError::Recognition(_)));
        assert!(!err.is_connection_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_request_times_out() {
        let config = SessionConfig::default();
        let context = SharedContext::new();
        let (recognizer, peer) = recognizer();
        let _peer = init(&recognizer, peer, &config, &context).await;

        let mut model = model_with_strokes(1);
        let snapshot = context.begin_request(&config, &mut model);

        let err = recognizer.recognize(&config, model, &snapshot).await.unwrap_err();
        assert!(matches!(err, InkError::Timeout { timeout_ms: 10_000, .. }));
        assert_eq!(recognizer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_init_rejected_key_is_connection_error() {
        let config = SessionConfig::default();
        let context = SharedContext::new();
        let (recognizer, mut peer) = recognizer();

        tokio::spawn(async move {
            let request = peer.requests.recv().await.unwrap();
            peer.responses
                .send(ProtocolMessage::error(
                    &request.envelope,
                    ErrorCode::InvalidApplicationKey,
                    "bad key",
                ))
                .unwrap();
            peer
        });

        let err = recognizer
            .init(
                &config,
                DocumentModel::new(ModelParams::default()),
                &context.snapshot(),
            )
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_recognize_without_outstanding_request_fails() {
        let config = SessionConfig::default();
        let context = SharedContext::new();
        let (recognizer, _peer) = recognizer();

        let err = recognizer
            .recognize(&config, model_with_strokes(1), &context.snapshot())
            .await
            .unwrap_err();
        assert!(matches!(err, InkError::Internal(_)));
    }

    #[tokio::test]
    async fn test_reinit_reuses_connection() {
        let config = SessionConfig::default();
        let (recognizer, peer) = recognizer();
        let peer = init(&recognizer, peer, &config, &SharedContext::new()).await;
        assert!(recognizer.is_connected());

        let _peer = init(&recognizer, peer, &config, &SharedContext::new()).await;
        assert!(recognizer.is_connected());
    }

    #[tokio::test]
    async fn test_close_disconnects_transport() {
        let config = SessionConfig::default();
        let context = SharedContext::new();
        let (recognizer, peer) = recognizer();
        let mut peer = init(&recognizer, peer, &config, &context).await;

        let model = DocumentModel::new(ModelParams::default());
        recognizer.close(&config, &model, &context.snapshot());

        assert!(peer.requests.recv().await.is_none());
        let err = recognizer
            .reset(&config, model, &context.snapshot())
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
    }
}
