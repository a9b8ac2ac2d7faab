use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{DocumentModel, PenStyle};

/// Drawing area dimensions in surface units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Handle to a renderer attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    id: Uuid,
    size: SurfaceSize,
}

impl RenderContext {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            id: Uuid::new_v4(),
            size,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn with_size(&self, size: SurfaceSize) -> Self {
        Self { id: self.id, size }
    }
}

/// Draws the document. All calls happen outside session locks and must not block.
pub trait Renderer: Send + Sync + 'static {
    fn attach(&self, size: SurfaceSize) -> RenderContext {
        RenderContext::new(size)
    }

    fn detach(&self, _context: &RenderContext) {}

    /// Draw the in-progress stroke only.
    fn draw_current_stroke(&self, context: &RenderContext, model: &DocumentModel, style: &PenStyle);

    /// Redraw every completed stroke and the recognition state.
    fn draw_model(&self, context: &RenderContext, model: &DocumentModel, style: &PenStyle);

    fn resize(&self, context: &RenderContext, model: &DocumentModel, style: &PenStyle) {
        self.draw_model(context, model, style);
    }
}

/// Renderer that draws nothing; the default binding of a new session.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn draw_current_stroke(&self, _: &RenderContext, _: &DocumentModel, _: &PenStyle) {}

    fn draw_model(&self, _: &RenderContext, _: &DocumentModel, _: &PenStyle) {}
}
