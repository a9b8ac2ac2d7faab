//! Client-side ink recognition sessions.
//!
//! An [`InkSession`] captures pen strokes into a [`DocumentModel`], records
//! every committed model for undo/redo, and submits strokes to a bound
//! [`Recognizer`] according to its [`TriggerMode`]. Results are merged back
//! only if the live model has not moved on in the meantime.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use inkrec::{InkSession, LoopbackBackend, Point, SessionConfig};
//!
//! let session = InkSession::new(SessionConfig::default());
//! let (recognizer, _backend) = LoopbackBackend::recognizer();
//! session.bind_recognizer(Arc::new(recognizer)).await?;
//!
//! session.pen_down(Point::new(0.0, 0.0, 0));
//! session.pen_move(Point::new(4.0, 8.0, 16));
//! session.pen_up(Point::new(8.0, 16.0, 32)).await;
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod error;
pub mod history;
pub mod model;
pub mod protocol;
pub mod recognizer;
pub mod session;
pub mod settings;
pub mod surface;

pub use error::{InkError, Result};
pub use history::{HistoryManager, HistoryState};
pub use model::{DocumentModel, PenStyle, Point, RecognitionState, Stroke};
pub use protocol::{Domain, ProtocolMessage};
pub use recognizer::{LoopbackBackend, ProtocolRecognizer, Recognizer, RecognizerContext};
pub use session::{InkSession, SessionEvent};
pub use settings::{SessionConfig, TriggerMode};
pub use surface::{Grabber, PenEvent, Renderer};
