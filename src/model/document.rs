//! The versioned document model and its capture transforms.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stroke::{BoundingBox, PenStyle, Point, Stroke};
use crate::protocol::{RecognizedContent, StrokeRange};
use crate::settings::SessionConfig;

static LAST_CREATION_TIME: AtomicI64 = AtomicI64::new(0);

/// Logical identity of a model generation.
///
/// Microseconds since the epoch, strictly increasing within the process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct CreationTime(i64);

impl CreationTime {
    pub fn now() -> Self {
        let now = Utc::now().timestamp_micros();
        let mut prev = LAST_CREATION_TIME.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match LAST_CREATION_TIME.compare_exchange_weak(
                prev,
                next,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(next),
                Err(actual) => prev = actual,
            }
        }
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.0)
    }
}

impl fmt::Display for CreationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recognition lifecycle of one model generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionState {
    #[default]
    Idle,
    AskingForRecognition,
    ProcessingRecognitionResult,
    RecognitionOver,
    RecognitionError,
}

impl RecognitionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecognitionState::RecognitionOver | RecognitionState::RecognitionError
        )
    }
}

/// How much of the stroke sequence has been submitted and merged.
///
/// Both values are stroke counts: `last_sent == 3` means strokes `0..3` were
/// part of the most recent request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RecognitionPositions {
    pub last_sent: usize,
    pub last_received: usize,
}

/// Recognized content merged into a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionResult {
    pub content: RecognizedContent,
    pub range: StrokeRange,
}

/// Immutable per-session capture parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelParams {
    pub min_point_distance: f64,
}

/// Container of strokes plus recognition bookkeeping.
///
/// Capture operations mutate in place; anything crossing an await point is a
/// clone, so an in-flight snapshot never observes later edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentModel {
    creation_time: CreationTime,
    strokes: Vec<Stroke>,
    pending_stroke: Option<Stroke>,
    state: RecognitionState,
    positions: RecognitionPositions,
    result: Option<RecognitionResult>,
    params: ModelParams,
}

impl DocumentModel {
    /// Create an empty model stamped with the current logical time.
    pub fn new(params: ModelParams) -> Self {
        Self {
            creation_time: CreationTime::now(),
            strokes: Vec::new(),
            pending_stroke: None,
            state: RecognitionState::Idle,
            positions: RecognitionPositions::default(),
            result: None,
            params,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(ModelParams {
            min_point_distance: config.pen.min_point_distance,
        })
    }

    pub fn creation_time(&self) -> CreationTime {
        self.creation_time
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    pub fn pending_stroke(&self) -> Option<&Stroke> {
        self.pending_stroke.as_ref()
    }

    pub fn has_pending_stroke(&self) -> bool {
        self.pending_stroke.is_some()
    }

    pub fn state(&self) -> RecognitionState {
        self.state
    }

    pub fn positions(&self) -> RecognitionPositions {
        self.positions
    }

    pub fn result(&self) -> Option<&RecognitionResult> {
        self.result.as_ref()
    }

    pub fn params(&self) -> ModelParams {
        self.params
    }

    /// Start a new in-progress stroke.
    ///
    /// Returns `false` (and changes nothing) when a stroke is already pending.
    pub fn init_pending_stroke(&mut self, point: Point, style: PenStyle) -> bool {
        if self.pending_stroke.is_some() {
            tracing::debug!("[model] pen down ignored: a stroke is already pending");
            return false;
        }
        self.pending_stroke = Some(Stroke::new(point, style));
        true
    }

    /// Extend the in-progress stroke. Returns `false` when there is none or
    /// the point was filtered out.
    pub fn append_to_pending_stroke(&mut self, point: Point) -> bool {
        let min_distance = self.params.min_point_distance;
        match self.pending_stroke.as_mut() {
            Some(stroke) => stroke.push_filtered(point, min_distance),
            None => {
                tracing::debug!("[model] pen move ignored: no pending stroke");
                false
            }
        }
    }

    /// Finalize the pending stroke into the completed sequence.
    ///
    /// The closing point is always kept. Starts a fresh recognition cycle
    /// (`Idle`) for this generation.
    pub fn end_pending_stroke(&mut self, point: Point) -> bool {
        let Some(mut stroke) = self.pending_stroke.take() else {
            tracing::debug!("[model] pen up ignored: no pending stroke");
            return false;
        };
        stroke.points.push(point);
        self.strokes.push(stroke);
        self.state = RecognitionState::Idle;
        true
    }

    /// Completed strokes not yet covered by `last_sent`.
    pub fn extract_pending_strokes(&self) -> &[Stroke] {
        self.strokes_from(self.positions.last_sent)
    }

    /// Completed strokes from `position` onward; empty when `position` is
    /// past the end.
    pub fn strokes_from(&self, position: usize) -> &[Stroke] {
        self.strokes.get(position..).unwrap_or(&[])
    }

    /// Deep copy without the in-progress stroke, suitable for history.
    pub fn committed_snapshot(&self) -> DocumentModel {
        let mut snapshot = self.clone();
        snapshot.pending_stroke = None;
        snapshot
    }

    /// A new, empty generation that keeps this model's parameters.
    pub fn cleared(&self) -> DocumentModel {
        Self::new(self.params)
    }

    /// Bounds of all completed strokes.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.strokes
            .iter()
            .filter_map(Stroke::bounds)
            .reduce(BoundingBox::union)
    }

    pub fn set_state(&mut self, state: RecognitionState) {
        self.state = state;
    }

    /// Record that every completed stroke is part of an outgoing request.
    pub fn mark_sent(&mut self) {
        self.positions.last_sent = self.strokes.len();
        self.positions.last_received = self.positions.last_received.min(self.positions.last_sent);
    }

    /// Attach a recognition result covering everything sent so far.
    pub fn with_recognition_result(mut self, result: RecognitionResult) -> Self {
        self.result = Some(result);
        self.positions.last_received = self.positions.last_sent;
        self.state = RecognitionState::ProcessingRecognitionResult;
        self
    }

    /// Tag this model as the carrier of a failed recognition.
    pub fn into_error(mut self) -> Self {
        self.state = RecognitionState::RecognitionError;
        self
    }

    pub(super) fn set_result(&mut self, result: Option<RecognitionResult>) {
        self.result = result;
    }

    pub(super) fn set_positions(&mut self, positions: RecognitionPositions) {
        self.positions = positions;
    }
}
