//! Recognition Capability
//!
//! The pluggable seam between the session and a recognition backend. The
//! session owns a [`SharedContext`] per binding and hands the recognizer a
//! [`RecognizerContext`] snapshot plus a model snapshot for every call; the
//! recognizer returns a new model and never touches the live one.

pub mod context;
pub mod loopback;
pub mod protocol_recognizer;
pub mod transport;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::DocumentModel;
use crate::settings::{SessionConfig, TriggerMode};

pub use context::{RecognizerContext, SharedContext};
pub use loopback::LoopbackBackend;
pub use protocol_recognizer::ProtocolRecognizer;
pub use transport::{ChannelTransport, MessageTransport, TransportPeer};

/// Static description of a recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerInfo {
    pub name: String,
    pub available_triggers: HashSet<TriggerMode>,
}

impl RecognizerInfo {
    pub fn new(name: impl Into<String>, triggers: impl IntoIterator<Item = TriggerMode>) -> Self {
        Self {
            name: name.into(),
            available_triggers: triggers.into_iter().collect(),
        }
    }

    pub fn supports(&self, trigger: TriggerMode) -> bool {
        self.available_triggers.contains(&trigger)
    }
}

/// A recognition backend.
///
/// Every async operation receives a snapshot of the model and returns a new
/// model; failures are reported through the `Err` arm and must leave the
/// recognizer usable for later calls.
#[async_trait]
pub trait Recognizer: Send + Sync + 'static {
    fn info(&self) -> RecognizerInfo;

    /// Prepare the backend for a session. Called once per binding.
    async fn init(
        &self,
        config: &SessionConfig,
        model: DocumentModel,
        context: &RecognizerContext,
    ) -> Result<DocumentModel>;

    /// Recognize the request outstanding in `context`.
    ///
    /// On success the returned model carries the result and has
    /// `last_received` advanced to what was sent.
    async fn recognize(
        &self,
        config: &SessionConfig,
        model: DocumentModel,
        context: &RecognizerContext,
    ) -> Result<DocumentModel>;

    /// Drop all ink the backend holds for this session.
    async fn reset(
        &self,
        config: &SessionConfig,
        model: DocumentModel,
        context: &RecognizerContext,
    ) -> Result<DocumentModel>;

    /// Release backend resources. Outstanding calls fail or are dropped.
    fn close(&self, config: &SessionConfig, model: &DocumentModel, context: &RecognizerContext);
}
