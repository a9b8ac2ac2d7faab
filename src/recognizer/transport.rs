//! Message transports carrying protocol messages to a recognition service.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{InkError, Result};
use crate::protocol::ProtocolMessage;

/// Bidirectional, message-oriented link to a recognition service.
#[async_trait]
pub trait MessageTransport: Send + Sync + 'static {
    /// Open the link and return the stream of inbound messages.
    async fn connect(&self) -> Result<mpsc::UnboundedReceiver<ProtocolMessage>>;

    async fn send(&self, message: ProtocolMessage) -> Result<()>;

    /// Close the link. Further sends fail.
    fn disconnect(&self);
}

/// In-process transport backed by a pair of unbounded channels.
///
/// Single use: the inbound stream can be taken once, and a disconnected
/// transport stays disconnected.
pub struct ChannelTransport {
    outgoing: Mutex<Option<mpsc::UnboundedSender<ProtocolMessage>>>,
    incoming: Mutex<Option<mpsc::UnboundedReceiver<ProtocolMessage>>>,
}

/// The service end of a [`ChannelTransport`].
pub struct TransportPeer {
    /// Requests sent by the client
    pub requests: mpsc::UnboundedReceiver<ProtocolMessage>,
    /// Responses delivered to the client
    pub responses: mpsc::UnboundedSender<ProtocolMessage>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, TransportPeer) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let transport = Self {
            outgoing: Mutex::new(Some(request_tx)),
            incoming: Mutex::new(Some(response_rx)),
        };
        let peer = TransportPeer {
            requests: request_rx,
            responses: response_tx,
        };
        (transport, peer)
    }
}

#[async_trait]
impl MessageTransport for ChannelTransport {
    async fn connect(&self) -> Result<mpsc::UnboundedReceiver<ProtocolMessage>> {
        if self.outgoing.lock().is_none() {
            return Err(InkError::Connection("transport is disconnected".to_string()));
        }
        self.incoming
            .lock()
            .take()
            .ok_or_else(|| InkError::Connection("transport is already connected".to_string()))
    }

    async fn send(&self, message: ProtocolMessage) -> Result<()> {
        let guard = self.outgoing.lock();
        let sender = guard
            .as_ref()
            .ok_or_else(|| InkError::Connection("transport is disconnected".to_string()))?;
        sender
            .send(message)
            .map_err(|_| InkError::Connection("recognition service went away".to_string()))
    }

    fn disconnect(&self) {
        if self.outgoing.lock().take().is_some() {
            tracing::debug!("[recognizer] channel transport disconnected");
        }
    }
}
