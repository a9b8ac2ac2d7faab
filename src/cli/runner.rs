//! CLI execution runner.
//!
//! Feeds recorded pen events into the session through a [`ReplayGrabber`],
//! waits for recognition to settle and prints the outcome.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::model::{DocumentModel, ModelParams, PenStyle, RecognitionState};
use crate::settings::TriggerMode;
use crate::surface::{Grabber, PenEvent, PenEventKind, PenEventSink};

use super::bootstrap::ReplayContext;
use super::output::{final_line, run_event_loop};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const INPUT_TIMEOUT: Duration = Duration::from_secs(5);
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Grabber that forwards events handed to it by the runner.
#[derive(Default)]
pub struct ReplayGrabber {
    sink: Mutex<Option<PenEventSink>>,
}

impl ReplayGrabber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.lock().is_some()
    }

    pub fn send(&self, event: PenEvent) -> Result<()> {
        let sink = self.sink.lock();
        let sink = sink
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Replay grabber is not attached to a session"))?;
        sink.send(event)
            .map_err(|_| anyhow::anyhow!("Session stopped accepting pen events"))
    }
}

impl Grabber for ReplayGrabber {
    fn attach(&self, sink: PenEventSink) {
        *self.sink.lock() = Some(sink);
    }

    fn detach(&self) {
        self.sink.lock().take();
    }
}

/// Read a JSON array of pen events.
pub async fn load_events(path: &Path) -> Result<Vec<PenEvent>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read pen events: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse pen events: {}", path.display()))
}

/// Number of strokes the events complete, applying the session's capture rules.
pub fn count_strokes(events: &[PenEvent]) -> usize {
    let mut scratch = DocumentModel::new(ModelParams::default());
    for event in events {
        match event.kind {
            PenEventKind::Down => {
                scratch.init_pending_stroke(event.point, PenStyle::default());
            }
            PenEventKind::Move => {
                scratch.append_to_pending_stroke(event.point);
            }
            PenEventKind::Up => {
                scratch.end_pending_stroke(event.point);
            }
        }
    }
    scratch.stroke_count()
}

/// Replay the input file named on the command line and print the result.
///
/// Returns the model the session settled on. A replay whose recognition
/// failed is an error.
pub async fn execute_replay(ctx: ReplayContext) -> Result<DocumentModel> {
    let input = ctx.args.resolve_input()?;
    let events = load_events(&input).await?;
    let expected = count_strokes(&events);
    let json_mode = ctx.args.json;
    let quiet_mode = ctx.args.quiet;

    if !quiet_mode && !json_mode {
        eprintln!(
            "[replay] {} event(s), {} stroke(s) from {}",
            events.len(),
            expected,
            input.display()
        );
    }

    let output_handle: JoinHandle<Result<()>> = tokio::spawn(run_event_loop(
        ctx.session.subscribe(),
        json_mode,
        quiet_mode,
    ));

    let result = replay(&ctx, &events, expected).await;

    // Dropping the session closes the event channel
    ctx.shutdown();
    match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, output_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::warn!("Output handler error: {}", e),
        Ok(Err(e)) => tracing::warn!("Output handler panicked: {}", e),
        Err(_) => tracing::warn!("Output handler did not finish"),
    }

    let model = result?;
    println!("{}", final_line(&model, json_mode)?);
    if model.state() == RecognitionState::RecognitionError {
        anyhow::bail!("Recognition failed");
    }
    Ok(model)
}

async fn replay(ctx: &ReplayContext, events: &[PenEvent], expected: usize) -> Result<DocumentModel> {
    let session = &ctx.session;
    let config = ctx.config();

    let grabber = Arc::new(ReplayGrabber::new());
    session.bind_grabber(grabber.clone());
    feed(&grabber, events, ctx.args.realtime).await?;

    wait_until(INPUT_TIMEOUT, || session.model().stroke_count() >= expected)
        .await
        .context("Timed out waiting for the session to consume the input")?;

    if expected == 0 {
        return Ok(session.model());
    }

    if config.trigger() == TriggerMode::Demand {
        // Failures are also reported on the event channel
        if let Err(e) = session.ask_for_recognition().await {
            tracing::debug!("[replay] recognition request failed: {}", e);
        }
    } else {
        let settle_timeout = config.recognition_quiet_period() + config.request_timeout() * 2;
        wait_until(settle_timeout, || is_settled(&session.model()))
            .await
            .context("Timed out waiting for recognition to settle")?;
    }

    // Let a coalesced notification reach the output loop
    if config.trigger() == TriggerMode::QuietPeriod {
        tokio::time::sleep(config.notification_quiet_period() + POLL_INTERVAL).await;
    }

    Ok(session.model())
}

async fn feed(grabber: &ReplayGrabber, events: &[PenEvent], realtime: bool) -> Result<()> {
    let mut previous_t: Option<i64> = None;
    for event in events {
        if realtime {
            if let Some(previous) = previous_t {
                let gap = (event.point.t - previous).max(0) as u64;
                tokio::time::sleep(Duration::from_millis(gap)).await;
            }
            previous_t = Some(event.point.t);
        }
        grabber.send(*event)?;
    }
    Ok(())
}

fn is_settled(model: &DocumentModel) -> bool {
    match model.state() {
        RecognitionState::RecognitionError => true,
        state => state.is_terminal() && model.positions().last_received >= model.stroke_count(),
    }
}

async fn wait_until<F>(timeout: Duration, mut condition: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("condition not reached within {:?}", timeout))
}
