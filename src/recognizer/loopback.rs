//! In-process stand-in for a recognition service.
//!
//! Answers the protocol faithfully enough to exercise a session end to end:
//! it keeps the stroke count of its own session, rejects submissions that
//! disagree with it, and "recognizes" ink by describing how much it holds.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::protocol_recognizer::ProtocolRecognizer;
use super::transport::{ChannelTransport, TransportPeer};
use crate::protocol::{
    Domain, Envelope, ErrorCode, Payload, ProtocolMessage, RecognizedContent, StrokeRange,
};

pub struct LoopbackBackend {
    handle: JoinHandle<()>,
}

impl LoopbackBackend {
    /// Serve the service end of a transport until the client disconnects.
    pub fn spawn(peer: TransportPeer) -> Self {
        Self {
            handle: tokio::spawn(serve(peer)),
        }
    }

    /// A [`ProtocolRecognizer`] wired to a freshly spawned backend.
    pub fn recognizer() -> (ProtocolRecognizer, LoopbackBackend) {
        let (transport, peer) = ChannelTransport::pair();
        let backend = Self::spawn(peer);
        (ProtocolRecognizer::new(Arc::new(transport)), backend)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

#[derive(Debug, Default)]
struct LoopbackSession {
    initialized: bool,
    strokes: usize,
}

impl LoopbackSession {
    fn respond(&mut self, request: &ProtocolMessage) -> Option<ProtocolMessage> {
        let envelope = &request.envelope;
        let response = match &request.payload {
            Payload::Init { .. } => {
                *self = LoopbackSession {
                    initialized: true,
                    strokes: 0,
                };
                ProtocolMessage::ack(envelope)
            }
            _ if !self.initialized => {
                ProtocolMessage::error(envelope, ErrorCode::InvalidRequest, "session not initialized")
            }
            Payload::Reset => {
                self.strokes = 0;
                ProtocolMessage::ack(envelope)
            }
            Payload::Start { components, .. } => {
                self.strokes = components.len();
                self.recognized(envelope)
            }
            Payload::Continue { components } => {
                self.strokes += components.len();
                self.recognized(envelope)
            }
            Payload::Cancel => return None,
            other => ProtocolMessage::error(
                envelope,
                ErrorCode::InvalidRequest,
                format!("unexpected {:?} request", other.kind()),
            ),
        };
        Some(response)
    }

    fn recognized(&self, envelope: &Envelope) -> ProtocolMessage {
        if self.strokes != envelope.stroke_count {
            return ProtocolMessage::error(
                envelope,
                ErrorCode::InvalidRequest,
                format!(
                    "session holds {} strokes but request claims {}",
                    self.strokes, envelope.stroke_count
                ),
            );
        }
        let content = match envelope.domain {
            Domain::Math => RecognizedContent::latex(format!("s_{{{}}}", self.strokes)),
            Domain::Text => RecognizedContent::text(describe(self.strokes)),
        };
        ProtocolMessage::result(envelope, content, StrokeRange::new(0, self.strokes))
    }
}

fn describe(strokes: usize) -> String {
    match strokes {
        1 => "1 stroke".to_string(),
        n => format!("{} strokes", n),
    }
}

async fn serve(mut peer: TransportPeer) {
    let mut session = LoopbackSession::default();
    while let Some(request) = peer.requests.recv().await {
        let Some(response) = session.respond(&request) else {
            tracing::debug!("[recognizer] loopback session cancelled");
            break;
        };
        if peer.responses.send(response).is_err() {
            break;
        }
    }
}
