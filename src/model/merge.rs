//! Race-safe merge of asynchronous recognition results into the live model.
//!
//! A result is applied only when it was produced from the same generation,
//! covers exactly the live stroke count, and is not older than what was
//! already merged. Anything else is discarded, never written blindly.

use std::fmt;

use serde::Serialize;

use super::document::{CreationTime, DocumentModel, RecognitionPositions, RecognitionState};

/// Why a recognition result could not be merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StaleReason {
    /// The live model was cleared after the request was issued
    GenerationMismatch {
        live: CreationTime,
        result: CreationTime,
    },
    /// Strokes were added or removed since the request was issued
    StrokeCountMismatch { live: usize, result: usize },
    /// A newer result has already been merged
    OutdatedResult {
        live_received: usize,
        result_sent: usize,
    },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::GenerationMismatch { live, result } => {
                write!(f, "generation {} does not match live generation {}", result, live)
            }
            StaleReason::StrokeCountMismatch { live, result } => {
                write!(f, "result covers {} strokes, live model has {}", result, live)
            }
            StaleReason::OutdatedResult {
                live_received,
                result_sent,
            } => write!(
                f,
                "result position {} is older than merged position {}",
                result_sent, live_received
            ),
        }
    }
}

/// Check whether `remote` may be merged into `local`.
pub fn check_merge_precondition(
    local: &DocumentModel,
    remote: &DocumentModel,
) -> Result<(), StaleReason> {
    if local.creation_time() != remote.creation_time() {
        return Err(StaleReason::GenerationMismatch {
            live: local.creation_time(),
            result: remote.creation_time(),
        });
    }
    if local.stroke_count() != remote.stroke_count() {
        return Err(StaleReason::StrokeCountMismatch {
            live: local.stroke_count(),
            result: remote.stroke_count(),
        });
    }
    if remote.positions().last_sent < local.positions().last_received {
        return Err(StaleReason::OutdatedResult {
            live_received: local.positions().last_received,
            result_sent: remote.positions().last_sent,
        });
    }
    Ok(())
}

/// Combine `local` stroke content with `remote` recognition output.
///
/// Returns `local` unchanged when the merge precondition does not hold.
pub fn merge_models(local: &DocumentModel, remote: &DocumentModel) -> DocumentModel {
    if let Err(reason) = check_merge_precondition(local, remote) {
        tracing::debug!("[model] merge skipped: {}", reason);
        return local.clone();
    }

    let mut merged = local.clone();
    let received = remote.positions().last_received;
    merged.set_result(remote.result().cloned());
    merged.set_positions(RecognitionPositions {
        last_sent: local.positions().last_sent.max(received),
        last_received: received,
    });
    merged.set_state(RecognitionState::RecognitionOver);
    merged
}
