//! Per-binding bookkeeping of what the remote recognizer has seen.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::model::{DocumentModel, RecognitionPositions};
use crate::protocol::ProtocolMessage;
use crate::settings::SessionConfig;

/// Snapshot of the recognizer-side state handed to a capability call.
#[derive(Debug, Clone)]
pub struct RecognizerContext {
    /// Identity of the binding this context belongs to
    pub id: Uuid,
    /// Positions the remote side has been sent / has answered
    pub last_positions: RecognitionPositions,
    /// Request issued for the current `recognize` call, if any
    pub outstanding: Option<ProtocolMessage>,
    /// Requests issued since the binding was created
    pub request_count: u64,
    /// Set when the live model was replaced wholesale (clear, undo, redo)
    pub needs_reset: bool,
}

impl RecognizerContext {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            last_positions: RecognitionPositions::default(),
            outstanding: None,
            request_count: 0,
            needs_reset: false,
        }
    }

    pub fn outstanding_request(&self) -> Option<&ProtocolMessage> {
        self.outstanding.as_ref()
    }
}

/// Shared, mutable recognizer context owned by the session.
///
/// A new one is created whenever a recognizer is bound or the session is
/// reconfigured; completions holding an old handle can detect that via [`id`](Self::id).
#[derive(Debug, Clone)]
pub struct SharedContext {
    inner: Arc<Mutex<RecognizerContext>>,
}

impl Default for SharedContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedContext {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecognizerContext::new())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.lock().id
    }

    pub fn snapshot(&self) -> RecognizerContext {
        self.inner.lock().clone()
    }

    pub fn last_positions(&self) -> RecognitionPositions {
        self.inner.lock().last_positions
    }

    /// Whether the service holds ink that `model` no longer accounts for
    /// (for example after undo), so it must be reset before the next submission.
    pub fn is_reset_required(&self, model: &DocumentModel) -> bool {
        let ctx = self.inner.lock();
        let sent = ctx.last_positions.last_sent;
        ctx.needs_reset || (sent > 0 && sent >= model.stroke_count())
    }

    /// Force a reset before the next submission.
    ///
    /// Used when the live model no longer extends what was sent, e.g. after
    /// a clear or a history move.
    pub fn invalidate(&self) {
        let mut ctx = self.inner.lock();
        if ctx.last_positions.last_sent > 0 {
            ctx.needs_reset = true;
        }
    }

    /// Build the submission for `model`'s unsent strokes and record it as outstanding.
    ///
    /// Marks every stroke of `model` as sent and returns the context snapshot
    /// to pass to `recognize`.
    pub fn begin_request(
        &self,
        config: &SessionConfig,
        model: &mut DocumentModel,
    ) -> RecognizerContext {
        let mut ctx = self.inner.lock();
        let from = ctx.last_positions.last_sent.min(model.stroke_count());
        let message = ProtocolMessage::submission(config, model, from);

        model.mark_sent();
        ctx.last_positions.last_sent = model.stroke_count();
        ctx.last_positions.last_received = ctx
            .last_positions
            .last_received
            .min(ctx.last_positions.last_sent);
        ctx.outstanding = Some(message);
        ctx.request_count += 1;
        ctx.clone()
    }

    /// Record the answer to `request_id`, covering strokes up to `received`.
    pub fn complete_request(&self, request_id: Uuid, received: usize) {
        let mut ctx = self.inner.lock();
        if ctx
            .outstanding
            .as_ref()
            .is_some_and(|m| m.request_id() == request_id)
        {
            ctx.outstanding = None;
        }
        let last_sent = ctx.last_positions.last_sent;
        ctx.last_positions.last_received = ctx
            .last_positions
            .last_received
            .max(received)
            .min(last_sent);
    }

    /// Forget everything sent so far (after a successful reset).
    pub fn reset_positions(&self) {
        let mut ctx = self.inner.lock();
        ctx.last_positions = RecognitionPositions::default();
        ctx.outstanding = None;
        ctx.needs_reset = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelParams, PenStyle, Point};
    use crate::protocol::MessageKind;

    fn add_strokes(model: &mut DocumentModel, count: usize) {
        for _ in 0..count {
            let x = model.stroke_count() as f64;
            model.init_pending_stroke(Point::new(x, 0.0, 0), PenStyle::default());
            model.end_pending_stroke(Point::new(x, 1.0, 1));
        }
    }

    #[test]
    fn test_first_request_is_start_then_continue() {
        let config = SessionConfig::default();
        let context = SharedContext::new();
        let mut model = DocumentModel::new(ModelParams::default());
        add_strokes(&mut model, 2);

        let first = context.begin_request(&config, &mut model);
        let message = first.outstanding_request().unwrap();
        assert_eq!(message.kind(), MessageKind::Start);
        assert_eq!(message.components().len(), 2);
        assert_eq!(model.positions().last_sent, 2);

        add_strokes(&mut model, 1);
        let second = context.begin_request(&config, &mut model);
        let message = second.outstanding_request().unwrap();
        assert_eq!(message.kind(), MessageKind::Continue);
        assert_eq!(message.components().len(), 1);
        assert_eq!(second.request_count, 2);
    }

    #[test]
    fn test_reset_required_after_rewind() {
        let config = SessionConfig::default();
        let context = SharedContext::new();
        let mut model = DocumentModel::new(ModelParams::default());
        add_strokes(&mut model, 1);
        let rewound = model.clone();
        assert!(!context.is_reset_required(&model));

        add_strokes(&mut model, 1);
        context.begin_request(&config, &mut model);

        // Same stroke count resubmitted, or fewer strokes after undo
        assert!(context.is_reset_required(&model));
        assert!(context.is_reset_required(&rewound));

        add_strokes(&mut model, 1);
        assert!(!context.is_reset_required(&model));

        context.reset_positions();
        assert!(!context.is_reset_required(&rewound));
    }

    #[test]
    fn test_invalidate_forces_reset_until_positions_reset() {
        let config = SessionConfig::default();
        let context = SharedContext::new();
        let mut model = DocumentModel::new(ModelParams::default());
        add_strokes(&mut model, 1);

        // Nothing sent yet, so there is nothing to reset
        context.invalidate();
        assert!(!context.is_reset_required(&model));

        context.begin_request(&config, &mut model);
        add_strokes(&mut model, 2);
        assert!(!context.is_reset_required(&model));

        context.invalidate();
        assert!(context.is_reset_required(&model));

        context.reset_positions();
        assert!(!context.is_reset_required(&model));
    }

    #[test]
    fn test_complete_request_clears_matching_outstanding() {
        let config = SessionConfig::default();
        let context = SharedContext::new();
        let mut model = DocumentModel::new(ModelParams::default());
        add_strokes(&mut model, 2);

        let snapshot = context.begin_request(&config, &mut model);
        let request_id = snapshot.outstanding_request().unwrap().request_id();

        context.complete_request(Uuid::new_v4(), 2);
        assert!(context.snapshot().outstanding.is_some());

        context.complete_request(request_id, 2);
        let after = context.snapshot();
        assert!(after.outstanding.is_none());
        assert_eq!(after.last_positions.last_received, 2);
    }

    #[test]
    fn test_each_context_has_distinct_id() {
        let a = SharedContext::new();
        let b = SharedContext::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }
}
