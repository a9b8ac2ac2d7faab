//! CLI output handling - Session event receiver loop.
//!
//! Renders session events as they are broadcast, either as human-readable
//! lines or as JSON lines for scripting.

use std::io::{self, Write};

use anyhow::Result;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::model::DocumentModel;
use crate::session::SessionEvent;

/// Run the event loop until the session's event channel closes.
///
/// # Arguments
///
/// * `event_rx` - Receiver subscribed to the session
/// * `json_mode` - If true, output events as JSON lines
/// * `quiet_mode` - If true, suppress everything but errors
pub async fn run_event_loop(
    mut event_rx: broadcast::Receiver<SessionEvent>,
    json_mode: bool,
    quiet_mode: bool,
) -> Result<()> {
    loop {
        match event_rx.recv().await {
            Ok(event) => handle_event(&event, json_mode, quiet_mode)?,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("[replay] output fell behind, {} events skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    Ok(())
}

fn handle_event(event: &SessionEvent, json_mode: bool, quiet_mode: bool) -> Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string(event)?);
        io::stdout().flush()?;
        return Ok(());
    }

    match event {
        // Errors are shown even in quiet mode
        SessionEvent::Error(err) => eprintln!("Error: {}", err),
        _ if quiet_mode => {}
        _ => println!("{}", format_event(event)),
    }
    Ok(())
}

/// Human-readable rendering of a session event.
pub fn format_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::StateChanged {
            generation,
            from,
            to,
        } => format!("[state] {:?} -> {:?} (generation {})", from, to, generation),
        SessionEvent::ModelChanged(model) => format!(
            "[model] {} stroke(s), {:?}{}",
            model.stroke_count(),
            model.state(),
            model
                .result()
                .map(|result| format!(": {}", result.content.summary()))
                .unwrap_or_default()
        ),
        SessionEvent::Error(err) => format!("[error] {}", err),
    }
}

/// The last line of a replay: the model the session settled on.
pub fn final_line(model: &DocumentModel, json_mode: bool) -> Result<String> {
    if json_mode {
        let line = serde_json::json!({
            "event": "final",
            "detail": model,
        });
        return Ok(line.to_string());
    }

    Ok(match model.result() {
        Some(result) => result.content.summary(),
        None => "(no result)".to_string(),
    })
}
