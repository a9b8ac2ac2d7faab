use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::Point;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PenEventKind {
    Down,
    Move,
    Up,
}

/// One raw pen sample, as produced by a grabber.
///
/// Serialized flat: `{"kind":"down","x":1.0,"y":2.0,"t":0}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PenEvent {
    pub kind: PenEventKind,
    #[serde(flatten)]
    pub point: Point,
}

impl PenEvent {
    pub fn down(point: Point) -> Self {
        Self {
            kind: PenEventKind::Down,
            point,
        }
    }

    pub fn moved(point: Point) -> Self {
        Self {
            kind: PenEventKind::Move,
            point,
        }
    }

    pub fn up(point: Point) -> Self {
        Self {
            kind: PenEventKind::Up,
            point,
        }
    }
}

pub type PenEventSink = mpsc::UnboundedSender<PenEvent>;

/// Source of pen input. The session attaches a sink on bind and detaches on rebind or close.
pub trait Grabber: Send + Sync + 'static {
    fn attach(&self, sink: PenEventSink);

    fn detach(&self);
}
