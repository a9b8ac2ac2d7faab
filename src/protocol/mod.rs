//! Protocol Message Model
//!
//! Typed request/response messages exchanged with the remote recognizer.
//!
//! ## Wire shape
//!
//! ```text
//! { "type": "start", "request_id": "...", "domain": "math",
//!   "generation": 1717000000000000, "stroke_count": 3,
//!   "parameters": {...}, "components": [{"type": "stroke", "x": [..], "y": [..], "t": [..]}] }
//! ```
//!
//! Requests carry only the unsent stroke delta, never the full history.

pub mod content;
pub mod messages;

pub use content::{Domain, InkComponent, MathExpression, RecognizedContent, StrokeRange, TextCandidate};
pub use messages::{Envelope, ErrorCode, MessageKind, Payload, ProtocolMessage};
