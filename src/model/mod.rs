//! Document Model
//!
//! Versioned container of captured strokes and recognition bookkeeping.
//! Everything here is plain data plus pure transforms; the session layer
//! decides when a snapshot is taken and when a result may be merged back.

pub mod document;
pub mod merge;
pub mod stroke;

pub use document::{
    CreationTime, DocumentModel, ModelParams, RecognitionPositions, RecognitionResult,
    RecognitionState,
};
pub use merge::{check_merge_precondition, merge_models, StaleReason};
pub use stroke::{BoundingBox, PenStyle, Point, Stroke};
