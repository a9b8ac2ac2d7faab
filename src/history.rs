//! Undo/redo history of committed document models.
//!
//! Entries are deep snapshots taken after a commit (pen-up, clear), so a
//! history entry never contains a half-drawn stroke and is never mutated
//! after it has been recorded.

use serde::Serialize;
use tokio::sync::Mutex;

use crate::model::DocumentModel;
use crate::settings::SessionConfig;

/// One recorded model.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub index: usize,
    pub model: DocumentModel,
}

/// Outcome of an undo or redo.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStep {
    /// The entry now under the cursor
    pub model: DocumentModel,
    /// Whether the cursor actually moved
    pub moved: bool,
}

/// Summary for hosts driving undo/redo buttons.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct HistoryState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub len: usize,
    pub cursor: usize,
}

/// The undo/redo sequence and its cursor. Never empty.
#[derive(Debug, Clone)]
pub struct UndoRedoContext {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    max_size: usize,
}

impl UndoRedoContext {
    pub fn new(initial: &DocumentModel, max_size: usize) -> Self {
        Self {
            entries: vec![HistoryEntry {
                index: 0,
                model: initial.committed_snapshot(),
            }],
            cursor: 0,
            max_size: max_size.max(1),
        }
    }

    /// Record `model`, dropping any redo tail. Returns the stored snapshot.
    pub fn push(&mut self, model: &DocumentModel) -> DocumentModel {
        let snapshot = model.committed_snapshot();
        self.entries.truncate(self.cursor + 1);
        self.entries.push(HistoryEntry {
            index: self.entries.len(),
            model: snapshot.clone(),
        });

        let overflow = self.entries.len().saturating_sub(self.max_size);
        if overflow > 0 {
            self.entries.drain(..overflow);
            for (index, entry) in self.entries.iter_mut().enumerate() {
                entry.index = index;
            }
        }

        self.cursor = self.entries.len() - 1;
        snapshot
    }

    pub fn undo(&mut self) -> HistoryStep {
        let moved = self.cursor > 0;
        if moved {
            self.cursor -= 1;
        }
        HistoryStep {
            model: self.current().clone(),
            moved,
        }
    }

    pub fn redo(&mut self) -> HistoryStep {
        let moved = self.cursor + 1 < self.entries.len();
        if moved {
            self.cursor += 1;
        }
        HistoryStep {
            model: self.current().clone(),
            moved,
        }
    }

    /// Reset to a single empty entry derived from `model`.
    pub fn clear(&mut self, model: &DocumentModel) -> DocumentModel {
        let cleared = model.cleared();
        self.entries = vec![HistoryEntry {
            index: 0,
            model: cleared.clone(),
        }];
        self.cursor = 0;
        cleared
    }

    /// Replace the entry under the cursor with a recognized version of it.
    ///
    /// Only applies when `model` has the entry's generation and stroke count.
    pub fn record_recognition(&mut self, model: &DocumentModel) -> bool {
        let current = &mut self.entries[self.cursor].model;
        if current.creation_time() != model.creation_time()
            || current.stroke_count() != model.stroke_count()
        {
            return false;
        }
        *current = model.committed_snapshot();
        true
    }

    pub fn current(&self) -> &DocumentModel {
        &self.entries[self.cursor].model
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
    }

    pub fn state(&self) -> HistoryState {
        HistoryState {
            can_undo: self.cursor > 0,
            can_redo: self.cursor + 1 < self.entries.len(),
            len: self.entries.len(),
            cursor: self.cursor,
        }
    }
}

/// Async front for the undo/redo context.
///
/// Callers that must not block (pen-up handling) await the push instead of
/// holding the session lock across it.
pub struct HistoryManager {
    context: Mutex<UndoRedoContext>,
}

impl HistoryManager {
    pub fn new(initial: &DocumentModel, config: &SessionConfig) -> Self {
        Self {
            context: Mutex::new(UndoRedoContext::new(initial, config.history.max_size)),
        }
    }

    pub async fn push_model(&self, model: &DocumentModel) -> DocumentModel {
        let mut context = self.context.lock().await;
        let snapshot = context.push(model);
        let state = context.state();
        tracing::debug!(
            "[history] pushed model with {} strokes (entries={}, cursor={})",
            snapshot.stroke_count(),
            state.len,
            state.cursor
        );
        snapshot
    }

    pub async fn record_recognition(&self, model: &DocumentModel) {
        if self.context.lock().await.record_recognition(model) {
            tracing::debug!(
                "[history] recorded result for {} strokes",
                model.stroke_count()
            );
        }
    }

    pub async fn undo(&self) -> HistoryStep {
        self.context.lock().await.undo()
    }

    pub async fn redo(&self) -> HistoryStep {
        self.context.lock().await.redo()
    }

    /// Reset to one empty entry derived from `model`, applying `config`'s size limit.
    pub async fn clear(&self, model: &DocumentModel, config: &SessionConfig) -> DocumentModel {
        let mut context = self.context.lock().await;
        context.set_max_size(config.history.max_size);
        context.clear(model)
    }

    pub async fn set_max_size(&self, max_size: usize) {
        self.context.lock().await.set_max_size(max_size);
    }

    pub async fn state(&self) -> HistoryState {
        self.context.lock().await.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelParams, PenStyle, Point, RecognitionResult};
    use crate::protocol::{RecognizedContent, StrokeRange};
    use proptest::prelude::*;

    fn add_stroke(model: &mut DocumentModel) {
        let x = model.stroke_count() as f64;
        model.init_pending_stroke(Point::new(x, 0.0, 0), PenStyle::default());
        model.end_pending_stroke(Point::new(x, 1.0, 1));
    }

    fn context_with_pushes(pushes: usize, max_size: usize) -> (UndoRedoContext, DocumentModel) {
        let mut model = DocumentModel::new(ModelParams::default());
        let mut context = UndoRedoContext::new(&model, max_size);
        for _ in 0..pushes {
            add_stroke(&mut model);
            context.push(&model);
        }
        (context, model)
    }

    #[test]
    fn test_undo_at_start_is_noop() {
        let (mut context, _) = context_with_pushes(0, 10);
        let step = context.undo();
        assert!(!step.moved);
        assert_eq!(step.model.stroke_count(), 0);
    }

    #[test]
    fn test_redo_at_end_is_noop() {
        let (mut context, model) = context_with_pushes(2, 10);
        let step = context.redo();
        assert!(!step.moved);
        assert_eq!(step.model, model);
    }

    #[test]
    fn test_push_after_undo_truncates_redo_tail() {
        let (mut context, _) = context_with_pushes(3, 10);
        context.undo();
        let mut branch = context.undo().model;
        assert_eq!(branch.stroke_count(), 1);

        add_stroke(&mut branch);
        context.push(&branch);

        assert!(!context.state().can_redo);
        assert!(!context.redo().moved);
        assert_eq!(context.state().len, 3);
    }

    #[test]
    fn test_push_stores_independent_snapshot() {
        let mut model = DocumentModel::new(ModelParams::default());
        let mut context = UndoRedoContext::new(&model, 10);
        add_stroke(&mut model);
        context.push(&model);

        add_stroke(&mut model);
        assert_eq!(context.current().stroke_count(), 1);
    }

    #[test]
    fn test_record_recognition_updates_cursor_entry_only() {
        let (mut context, model) = context_with_pushes(2, 10);
        let recognized = model.clone().with_recognition_result(RecognitionResult {
            content: RecognizedContent::text("ab"),
            range: StrokeRange::new(0, 2),
        });
        assert!(context.record_recognition(&recognized));

        let undone = context.undo().model;
        assert!(undone.result().is_none());
        assert!(!context.record_recognition(&recognized));

        let redone = context.redo().model;
        assert_eq!(redone.result().unwrap().content.summary(), "ab");

        let other_generation = DocumentModel::new(ModelParams::default());
        assert!(!context.record_recognition(&other_generation));
    }

    #[test]
    fn test_max_size_evicts_oldest() {
        let (context, _) = context_with_pushes(5, 3);
        let state = context.state();
        assert_eq!(state.len, 3);
        assert_eq!(state.cursor, 2);
        assert_eq!(context.current().stroke_count(), 5);
        assert_eq!(context.entries[0].index, 0);
        assert_eq!(context.entries[0].model.stroke_count(), 3);
    }

    #[test]
    fn test_clear_keeps_params_and_resets_cursor() {
        let mut model = DocumentModel::new(ModelParams {
            min_point_distance: 3.0,
        });
        let mut context = UndoRedoContext::new(&model, 10);
        add_stroke(&mut model);
        context.push(&model);

        let cleared = context.clear(&model);
        assert_eq!(cleared.stroke_count(), 0);
        assert_eq!(cleared.params(), model.params());
        assert_ne!(cleared.creation_time(), model.creation_time());
        assert_eq!(
            context.state(),
            HistoryState {
                can_undo: false,
                can_redo: false,
                len: 1,
                cursor: 0
            }
        );
    }

    #[tokio::test]
    async fn test_manager_push_undo_redo() {
        let config = SessionConfig::default();
        let mut model = DocumentModel::new(ModelParams::default());
        let manager = HistoryManager::new(&model, &config);

        add_stroke(&mut model);
        let pushed = manager.push_model(&model).await;
        assert_eq!(pushed, model);

        let undone = manager.undo().await;
        assert!(undone.moved);
        assert_eq!(undone.model.stroke_count(), 0);

        let redone = manager.redo().await;
        assert_eq!(redone.model, model);
        assert!(manager.state().await.can_undo);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: redo(undo(M)) == M whenever there is something to undo
        #[test]
        fn prop_redo_undoes_undo(pushes in 1usize..12, undos in 0usize..12) {
            let (mut context, _) = context_with_pushes(pushes, 50);
            for _ in 0..undos.min(pushes - 1) {
                context.undo();
            }
            let before = context.current().clone();
            prop_assume!(context.state().can_undo);

            context.undo();
            let after = context.redo();
            prop_assert!(after.moved);
            prop_assert_eq!(after.model, before);
        }

        /// Property: the cursor always addresses a valid entry
        #[test]
        fn prop_cursor_stays_valid(ops in prop::collection::vec(0u8..3, 0..40), max_size in 1usize..8) {
            let mut model = DocumentModel::new(ModelParams::default());
            let mut context = UndoRedoContext::new(&model, max_size);
            for op in ops {
                match op {
                    0 => {
                        add_stroke(&mut model);
                        context.push(&model);
                    }
                    1 => {
                        context.undo();
                    }
                    _ => {
                        context.redo();
                    }
                }
                let state = context.state();
                prop_assert!(state.cursor < state.len);
                prop_assert!(state.len <= max_size);
            }
        }
    }
}
