//! Session Orchestrator
//!
//! [`InkSession`] owns the live [`DocumentModel`], the undo/redo history and
//! the bound capabilities (recognizer, renderer, grabber). Pen input mutates
//! the live model synchronously; recognition runs as spawned tasks on model
//! snapshots and its results are merged back only when the merge
//! precondition holds against whatever the live model is at completion time.
//!
//! Locks guarding the live model, configuration and bindings are only held
//! for synchronous sections. Capabilities are always called with owned
//! snapshots, outside of any lock.

mod events;
mod timers;


use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::{InkError, Result};
use crate::history::{HistoryManager, HistoryState, HistoryStep};
use crate::model::{
    check_merge_precondition, merge_models, DocumentModel, PenStyle, Point, RecognitionState,
};
use crate::protocol::ProtocolMessage;
use crate::recognizer::{Recognizer, RecognizerInfo, SharedContext};
use crate::settings::{SessionConfig, TriggerMode};
use crate::surface::{
    Grabber, NullRenderer, PenEvent, PenEventKind, RenderContext, Renderer, SurfaceSize,
};

pub use events::{ModelObserver, ObserverId, ObserverRegistry, SessionEvent};
pub use timers::DebounceTimer;

const EVENT_CAPACITY: usize = 256;

#[derive(Clone)]
struct RecognizerBinding {
    recognizer: Arc<dyn Recognizer>,
    context: SharedContext,
    info: RecognizerInfo,
}

#[derive(Clone)]
struct RendererBinding {
    renderer: Arc<dyn Renderer>,
    context: RenderContext,
}

struct GrabberBinding {
    grabber: Arc<dyn Grabber>,
    pump: JoinHandle<()>,
}

struct SessionInner {
    config: RwLock<SessionConfig>,
    model: Mutex<DocumentModel>,
    pen_style: RwLock<PenStyle>,
    history: HistoryManager,
    recognizer: RwLock<Option<RecognizerBinding>>,
    renderer: RwLock<RendererBinding>,
    grabber: Mutex<Option<GrabberBinding>>,
    recognition_timer: DebounceTimer,
    notification_timer: DebounceTimer,
    observers: ObserverRegistry,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionInner {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Hand a committed model to observers and event subscribers.
    fn publish(&self, model: &DocumentModel) {
        self.observers.notify(model);
        self.emit(SessionEvent::ModelChanged(Arc::new(model.clone())));
    }
}

/// A recognition session. Cheap to clone; clones share the same session.
///
/// Must be used from within a tokio runtime: recognition, debounce timers
/// and the grabber pump run as spawned tasks.
#[derive(Clone)]
pub struct InkSession {
    inner: Arc<SessionInner>,
}

impl InkSession {
    /// Create a session with an empty model, no recognizer and a renderer that draws nothing.
    pub fn new(config: SessionConfig) -> Self {
        let model = DocumentModel::from_config(&config);
        let history = HistoryManager::new(&model, &config);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let renderer: Arc<dyn Renderer> = Arc::new(NullRenderer);
        let render_context = renderer.attach(SurfaceSize::default());

        tracing::info!(
            "[session] created (generation {}, trigger {})",
            model.creation_time(),
            config.trigger()
        );

        Self {
            inner: Arc::new(SessionInner {
                pen_style: RwLock::new(config.pen.style.clone()),
                config: RwLock::new(config),
                model: Mutex::new(model),
                history,
                recognizer: RwLock::new(None),
                renderer: RwLock::new(RendererBinding {
                    renderer,
                    context: render_context,
                }),
                grabber: Mutex::new(None),
                recognition_timer: DebounceTimer::new("recognition"),
                notification_timer: DebounceTimer::new("notification"),
                observers: ObserverRegistry::default(),
                events,
            }),
        }
    }

    fn downgrade(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn config(&self) -> SessionConfig {
        self.inner.config.read().clone()
    }

    /// Snapshot of the live model
    pub fn model(&self) -> DocumentModel {
        self.inner.model.lock().clone()
    }

    pub async fn history_state(&self) -> HistoryState {
        self.inner.history.state().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn add_observer<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&DocumentModel) + Send + Sync + 'static,
    {
        self.inner.observers.add(Arc::new(observer))
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.observers.remove(id)
    }

    /// Trigger modes of the bound recognizer; empty when none is bound.
    pub fn available_triggers(&self) -> HashSet<TriggerMode> {
        self.recognizer_binding()
            .map(|binding| binding.info.available_triggers)
            .unwrap_or_default()
    }

    pub fn pen_style(&self) -> PenStyle {
        self.inner.pen_style.read().clone()
    }

    /// Style applied to strokes started from now on
    pub fn set_pen_style(&self, style: PenStyle) {
        *self.inner.pen_style.write() = style;
    }

    // ---- capture ----

    /// Start a stroke. Returns `false` if one is already in progress.
    pub fn pen_down(&self, point: Point) -> bool {
        let style = self.pen_style();
        let snapshot = {
            let mut model = self.inner.model.lock();
            if !model.init_pending_stroke(point, style.clone()) {
                return false;
            }
            model.clone()
        };
        let binding = self.renderer_binding();
        binding
            .renderer
            .draw_current_stroke(&binding.context, &snapshot, &style);
        true
    }

    /// Extend the current stroke. Returns `false` if there is none or the
    /// point was filtered out.
    pub fn pen_move(&self, point: Point) -> bool {
        let snapshot = {
            let mut model = self.inner.model.lock();
            if !model.append_to_pending_stroke(point) {
                return false;
            }
            model.clone()
        };
        let style = self.pen_style();
        let binding = self.renderer_binding();
        binding
            .renderer
            .draw_current_stroke(&binding.context, &snapshot, &style);
        true
    }

    /// Commit the current stroke, record it in history and apply the trigger policy.
    pub async fn pen_up(&self, point: Point) -> bool {
        let (before, committed) = {
            let mut model = self.inner.model.lock();
            let before = model.state();
            if !model.end_pending_stroke(point) {
                return false;
            }
            (before, model.clone())
        };
        self.emit_transition(&committed, before);
        self.render_model(&committed);

        let recorded = self.inner.history.push_model(&committed).await;
        self.publish_committed(recorded);
        self.schedule_recognition();
        true
    }

    pub async fn handle_pen_event(&self, event: PenEvent) -> bool {
        match event.kind {
            PenEventKind::Down => self.pen_down(event.point),
            PenEventKind::Move => self.pen_move(event.point),
            PenEventKind::Up => self.pen_up(event.point).await,
        }
    }

    // ---- recognition ----

    /// Submit the live model now, regardless of the trigger mode.
    ///
    /// Resolves to the merged live model, or to the error that was also
    /// reported on the event channel.
    pub async fn ask_for_recognition(&self) -> Result<DocumentModel> {
        self.inner.recognition_timer.cancel();
        self.run_recognition().await
    }

    fn schedule_recognition(&self) {
        let Some(binding) = self.recognizer_binding() else {
            tracing::debug!("[session] no recognizer bound, nothing submitted");
            return;
        };
        let config = self.config();
        let trigger = config.trigger();
        if !validate_trigger(&binding.info, trigger) {
            return;
        }

        match trigger {
            TriggerMode::PenUp => self.spawn_recognition(),
            TriggerMode::QuietPeriod => {
                let session = self.downgrade();
                self.inner
                    .recognition_timer
                    .restart(config.recognition_quiet_period(), move || {
                        if let Some(inner) = session.upgrade() {
                            InkSession { inner }.spawn_recognition();
                        }
                    });
            }
            TriggerMode::Demand => {
                tracing::debug!("[session] demand trigger, waiting for an explicit request");
            }
        }
    }

    fn spawn_recognition(&self) {
        let session = self.clone();
        tokio::spawn(async move {
            if let Err(err) = session.run_recognition().await {
                tracing::debug!("[session] recognition pass ended without a merge: {}", err);
            }
        });
    }

    async fn run_recognition(&self) -> Result<DocumentModel> {
        let binding = self
            .recognizer_binding()
            .ok_or_else(|| InkError::Connection("no recognizer is bound".to_string()))?;
        let config = self.config();
        let snapshot = self.model();

        if snapshot.stroke_count() == 0 {
            if binding.context.is_reset_required(&snapshot) {
                self.reset_backend(&binding, &config, snapshot.clone()).await?;
            }
            return Ok(snapshot);
        }

        self.set_live_state(&snapshot, RecognitionState::AskingForRecognition);
        if binding.context.is_reset_required(&snapshot) {
            self.reset_backend(&binding, &config, snapshot.clone()).await?;
        }

        let mut request = snapshot;
        let context = binding.context.begin_request(&config, &mut request);
        let request_id = context.outstanding_request().map(ProtocolMessage::request_id);
        if let Some(message) = context.outstanding_request() {
            tracing::debug!(
                "[session] submitting {:?} with {} strokes (generation {}, {} total)",
                message.kind(),
                message.components().len(),
                request.creation_time(),
                request.stroke_count()
            );
        }

        match binding
            .recognizer
            .recognize(&config, request.clone(), &context)
            .await
        {
            Ok(remote) => {
                if let Some(request_id) = request_id {
                    binding
                        .context
                        .complete_request(request_id, remote.positions().last_received);
                }
                self.apply_result(&binding, remote).await
            }
            Err(err) if !self.is_current_binding(&binding) => {
                Err(self.ignore_replaced(&binding, err))
            }
            Err(err) => Err(self.report_failure(&request, err)),
        }
    }

    async fn reset_backend(
        &self,
        binding: &RecognizerBinding,
        config: &SessionConfig,
        model: DocumentModel,
    ) -> Result<()> {
        let context = binding.context.snapshot();
        match binding
            .recognizer
            .reset(config, model.clone(), &context)
            .await
        {
            Ok(_) => {
                binding.context.reset_positions();
                tracing::debug!("[session] recognizer reset (context {})", context.id);
                Ok(())
            }
            Err(err) if !self.is_current_binding(binding) => {
                Err(self.ignore_replaced(binding, err))
            }
            Err(err) => Err(self.report_failure(&model, err)),
        }
    }

    /// Merge `remote` into the live model if the precondition holds.
    ///
    /// A merged model also replaces the history entry it was recognized
    /// from, so undo and redo bring the result back with the strokes.
    async fn apply_result(
        &self,
        binding: &RecognizerBinding,
        remote: DocumentModel,
    ) -> Result<DocumentModel> {
        if !self.is_current_binding(binding) {
            tracing::info!(
                "[session] dropping result from replaced recognizer context {}",
                binding.context.id()
            );
            return Err(InkError::Connection(
                "recognizer binding was replaced while the request was in flight".to_string(),
            ));
        }

        let outcome = {
            let mut live = self.inner.model.lock();
            match check_merge_precondition(&live, &remote) {
                Ok(()) => {
                    let before = live.state();
                    let merged = merge_models(&live, &remote);
                    *live = merged.clone();
                    Ok((before, merged))
                }
                Err(reason) => Err(reason),
            }
        };

        match outcome {
            Ok((before, merged)) => {
                tracing::debug!(
                    "[session] merged result covering {} strokes",
                    merged.positions().last_received
                );
                self.inner.history.record_recognition(&merged).await;
                self.emit_transition(&merged, before);
                self.render_model(&merged);
                self.publish_committed(merged.clone());
                Ok(merged)
            }
            Err(reason) => {
                // The live model and any pending notification of it stay as they are
                tracing::warn!("[session] discarding recognition result: {}", reason);
                let error = InkError::StaleResult(reason);
                self.inner.emit(SessionEvent::Error(Arc::new(error.clone())));
                Err(error)
            }
        }
    }

    fn ignore_replaced(&self, binding: &RecognizerBinding, error: InkError) -> InkError {
        tracing::info!(
            "[session] ignoring failure from replaced recognizer context {}: {}",
            binding.context.id(),
            error
        );
        error
    }

    /// Surface a capability failure: tag the model, notify observers and emit the error event.
    ///
    /// The live model is moved to `RecognitionError` when it is still the
    /// generation and stroke count `model` was taken from. Otherwise it is
    /// left alone and observers see a copy of it tagged with the error state.
    fn report_failure(&self, model: &DocumentModel, error: InkError) -> InkError {
        tracing::error!("[session] {}", error);

        let (shown, transition) = {
            let mut live = self.inner.model.lock();
            if live.creation_time() == model.creation_time()
                && live.stroke_count() == model.stroke_count()
            {
                let before = live.state();
                live.set_state(RecognitionState::RecognitionError);
                (live.clone(), Some(before))
            } else {
                (live.clone().into_error(), None)
            }
        };

        if let Some(before) = transition {
            self.emit_transition(&shown, before);
            self.render_model(&shown);
            self.inner.notification_timer.cancel();
        }
        self.inner.publish(&shown);
        self.inner.emit(SessionEvent::Error(Arc::new(error.clone())));
        error
    }

    // ---- history ----

    pub async fn undo(&self) -> DocumentModel {
        let step = self.inner.history.undo().await;
        self.restore(step)
    }

    pub async fn redo(&self) -> DocumentModel {
        let step = self.inner.history.redo().await;
        self.restore(step)
    }

    fn restore(&self, step: HistoryStep) -> DocumentModel {
        if !step.moved {
            tracing::debug!("[session] nothing to restore");
            return self.model();
        }

        self.inner.recognition_timer.cancel();
        if let Some(binding) = self.recognizer_binding() {
            binding.context.invalidate();
        }

        let restored = step.model;
        let before = {
            let mut live = self.inner.model.lock();
            let before = live.state();
            *live = restored.clone();
            before
        };
        tracing::debug!(
            "[session] restored model with {} strokes",
            restored.stroke_count()
        );

        self.emit_transition(&restored, before);
        self.render_model(&restored);
        self.publish_committed(restored.clone());
        if is_fully_recognized(&restored) {
            tracing::debug!("[session] restored model already carries its result");
        } else {
            self.schedule_recognition();
        }
        restored
    }

    /// Replace the document with an empty generation and reset the history.
    ///
    /// Results still in flight for the old generation are discarded when
    /// they arrive.
    pub async fn clear(&self) -> DocumentModel {
        self.inner.recognition_timer.cancel();
        self.inner.notification_timer.cancel();

        let config = self.config();
        let current = self.model();
        let cleared = self.inner.history.clear(&current, &config).await;
        if let Some(binding) = self.recognizer_binding() {
            binding.context.invalidate();
        }

        let before = {
            let mut live = self.inner.model.lock();
            let before = live.state();
            *live = cleared.clone();
            before
        };
        tracing::info!("[session] cleared (generation {})", cleared.creation_time());

        self.emit_transition(&cleared, before);
        self.render_model(&cleared);
        self.inner.publish(&cleared);
        cleared
    }

    // ---- bindings ----

    /// Replace the recognizer: close the previous one, then initialise
    /// `recognizer` with a fresh context.
    ///
    /// An unsupported trigger mode is logged; the recognizer is still bound
    /// so the host can reconfigure.
    pub async fn bind_recognizer(&self, recognizer: Arc<dyn Recognizer>) -> Result<()> {
        self.unbind_recognizer();

        let binding = RecognizerBinding {
            info: recognizer.info(),
            recognizer,
            context: SharedContext::new(),
        };
        tracing::info!(
            "[session] binding recognizer '{}' (context {})",
            binding.info.name,
            binding.context.id()
        );
        self.init_binding(binding).await
    }

    /// Apply new settings and re-initialise the bound recognizer with a fresh context.
    ///
    /// Capture parameters of the live model are fixed at creation and are not affected.
    pub async fn reconfigure(&self, config: SessionConfig) -> Result<()> {
        self.inner.recognition_timer.cancel();
        self.inner
            .history
            .set_max_size(config.history.max_size)
            .await;
        *self.inner.pen_style.write() = config.pen.style.clone();
        *self.inner.config.write() = config;
        tracing::info!("[session] reconfigured");

        let previous = self.inner.recognizer.write().take();
        let Some(previous) = previous else {
            return Ok(());
        };
        let binding = RecognizerBinding {
            info: previous.recognizer.info(),
            recognizer: previous.recognizer,
            context: SharedContext::new(),
        };
        self.init_binding(binding).await
    }

    async fn init_binding(&self, binding: RecognizerBinding) -> Result<()> {
        let config = self.config();
        validate_trigger(&binding.info, config.trigger());

        let model = self.model();
        let context = binding.context.snapshot();
        if let Err(err) = binding
            .recognizer
            .init(&config, model.clone(), &context)
            .await
        {
            binding.recognizer.close(&config, &model, &context);
            return Err(self.report_failure(&model, err));
        }

        *self.inner.recognizer.write() = Some(binding);
        if self.model().stroke_count() > 0 {
            self.schedule_recognition();
        }
        Ok(())
    }

    fn unbind_recognizer(&self) {
        self.inner.recognition_timer.cancel();
        let previous = self.inner.recognizer.write().take();
        if let Some(previous) = previous {
            let config = self.config();
            let model = self.model();
            previous
                .recognizer
                .close(&config, &model, &previous.context.snapshot());
            tracing::info!("[session] closed recognizer '{}'", previous.info.name);
        }
    }

    /// Replace the renderer, detaching the previous one first, and draw the live model.
    pub fn bind_renderer(&self, renderer: Arc<dyn Renderer>) {
        let previous = self.renderer_binding();
        previous.renderer.detach(&previous.context);

        let context = renderer.attach(previous.context.size());
        let binding = RendererBinding { renderer, context };
        *self.inner.renderer.write() = binding.clone();

        let model = self.model();
        binding
            .renderer
            .draw_model(&binding.context, &model, &self.pen_style());
    }

    pub fn resize(&self, size: SurfaceSize) {
        let binding = {
            let mut binding = self.inner.renderer.write();
            binding.context = binding.context.with_size(size);
            binding.clone()
        };
        let model = self.model();
        binding
            .renderer
            .resize(&binding.context, &model, &self.pen_style());
    }

    /// Replace the input source. Events from the grabber are applied in
    /// arrival order by a pump task.
    pub fn bind_grabber(&self, grabber: Arc<dyn Grabber>) {
        self.unbind_grabber();

        let (sink, mut events) = mpsc::unbounded_channel::<PenEvent>();
        let session = self.downgrade();
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = session.upgrade() else {
                    break;
                };
                InkSession { inner }.handle_pen_event(event).await;
            }
            tracing::debug!("[session] grabber stream ended");
        });

        grabber.attach(sink);
        *self.inner.grabber.lock() = Some(GrabberBinding { grabber, pump });
    }

    fn unbind_grabber(&self) {
        let previous = self.inner.grabber.lock().take();
        if let Some(previous) = previous {
            previous.grabber.detach();
            previous.pump.abort();
        }
    }

    /// Tear down every binding and pending timer. The live model and history are kept.
    pub fn close(&self) {
        self.inner.recognition_timer.cancel();
        self.inner.notification_timer.cancel();
        self.unbind_grabber();
        self.unbind_recognizer();

        let previous = {
            let mut binding = self.inner.renderer.write();
            let size = binding.context.size();
            std::mem::replace(
                &mut *binding,
                RendererBinding {
                    renderer: Arc::new(NullRenderer),
                    context: RenderContext::new(size),
                },
            )
        };
        previous.renderer.detach(&previous.context);
        tracing::info!("[session] closed");
    }

    // ---- helpers ----

    fn recognizer_binding(&self) -> Option<RecognizerBinding> {
        self.inner.recognizer.read().clone()
    }

    fn is_current_binding(&self, binding: &RecognizerBinding) -> bool {
        self.inner
            .recognizer
            .read()
            .as_ref()
            .is_some_and(|current| current.context.id() == binding.context.id())
    }

    fn renderer_binding(&self) -> RendererBinding {
        self.inner.renderer.read().clone()
    }

    fn render_model(&self, model: &DocumentModel) {
        let binding = self.renderer_binding();
        binding
            .renderer
            .draw_model(&binding.context, model, &self.pen_style());
    }

    /// Notify observers of a committed model, debounced in quiet-period mode.
    fn publish_committed(&self, model: DocumentModel) {
        let config = self.config();
        if config.trigger() != TriggerMode::QuietPeriod {
            self.inner.publish(&model);
            return;
        }
        let session = self.downgrade();
        self.inner
            .notification_timer
            .restart(config.notification_quiet_period(), move || {
                if let Some(inner) = session.upgrade() {
                    inner.publish(&model);
                }
            });
    }

    /// Move the live model to `state` if it is still the snapshot's generation and stroke count.
    fn set_live_state(&self, snapshot: &DocumentModel, state: RecognitionState) {
        let transition = {
            let mut live = self.inner.model.lock();
            if live.creation_time() != snapshot.creation_time()
                || live.stroke_count() != snapshot.stroke_count()
                || live.state() == state
            {
                None
            } else {
                let before = live.state();
                live.set_state(state);
                Some((before, live.clone()))
            }
        };
        if let Some((before, live)) = transition {
            self.emit_transition(&live, before);
        }
    }

    fn emit_transition(&self, model: &DocumentModel, from: RecognitionState) {
        let to = model.state();
        if from == to {
            return;
        }
        tracing::debug!("[session] state {:?} -> {:?}", from, to);
        self.inner.emit(SessionEvent::StateChanged {
            generation: model.creation_time(),
            from,
            to,
        });
    }
}

fn is_fully_recognized(model: &DocumentModel) -> bool {
    model.state() == RecognitionState::RecognitionOver
        && model.positions().last_received >= model.stroke_count()
}

/// Log a configuration error when `trigger` is not offered by the recognizer.
fn validate_trigger(info: &RecognizerInfo, trigger: TriggerMode) -> bool {
    if info.supports(trigger) {
        return true;
    }
    let err = InkError::UnsupportedTrigger { requested: trigger };
    tracing::error!(
        "[session] {} ('{}' offers {:?})",
        err,
        info.name,
        info.available_triggers
    );
    false
}
