//! CLI module for headless session replay.
//!
//! Drives an [`InkSession`](crate::session::InkSession) from a recorded pen
//! event file, with the in-process loopback backend standing in for the
//! recognition service. Useful for exercising trigger policies and the
//! event stream without a host application.
//!
//! # Architecture
//!
//! ```text
//! +---------------+     +-------------+     +----------------+     +---------------+
//! | events.json   | --> | Replay      | --> | InkSession     | --> | output.rs     |
//! | (runner.rs)   |     | Grabber     |     | + Loopback     |     | (print/JSON)  |
//! +---------------+     +-------------+     +----------------+     +---------------+
//! ```

mod args;
mod bootstrap;
mod output;
mod runner;

pub use args::Args;
pub use bootstrap::{apply_overrides, initialize, ReplayContext};
pub use output::{final_line, format_event, run_event_loop};
pub use runner::{count_strokes, execute_replay, load_events, ReplayGrabber};
