//! Host-facing notifications: broadcast events and model observers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::InkError;
use crate::model::{CreationTime, DocumentModel, RecognitionState};

/// Events delivered on the session's broadcast channel.
///
/// Serialized as `{"event": <name>, "detail": <payload>}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "detail", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// The live model moved between recognition states
    StateChanged {
        generation: CreationTime,
        from: RecognitionState,
        to: RecognitionState,
    },
    /// A committed model was published to observers
    ModelChanged(Arc<DocumentModel>),
    /// A recognition, reset or init failure, or a discarded result
    Error(Arc<InkError>),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::StateChanged { .. } => "state-changed",
            SessionEvent::ModelChanged(_) => "model-changed",
            SessionEvent::Error(_) => "error",
        }
    }
}

pub type ModelObserver = Arc<dyn Fn(&DocumentModel) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Callbacks invoked with every committed model.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: RwLock<Vec<(ObserverId, ModelObserver)>>,
}

impl ObserverRegistry {
    pub fn add(&self, observer: ModelObserver) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    pub fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every observer. The registry lock is released first, so an
    /// observer may register or remove observers.
    pub fn notify(&self, model: &DocumentModel) {
        let observers: Vec<ModelObserver> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer(model);
        }
    }
}
