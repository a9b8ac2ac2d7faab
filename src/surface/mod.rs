//! Host-side surfaces the session drives: a renderer for ink and an input
//! grabber feeding pen events.

pub mod grabber;
pub mod renderer;

pub use grabber::{Grabber, PenEvent, PenEventKind, PenEventSink};
pub use renderer::{NullRenderer, RenderContext, Renderer, SurfaceSize};
