//! inkrec-replay - Replay recorded pen input through a recognition session
//!
//! Reads a JSON array of pen events, feeds it to a session wired to the
//! in-process loopback recognizer and prints the session's events.
//!
//! # Usage
//!
//! ```bash
//! # Build the replay binary
//! cargo build --features cli --bin inkrec-replay
//!
//! # Replay with the trigger policy from ~/.inkrec/config.toml
//! ./target/debug/inkrec-replay strokes.json
//!
//! # Quiet-period trigger, math domain
//! ./target/debug/inkrec-replay strokes.json -t quiet-period -d math
//!
//! # JSON lines for scripting
//! ./target/debug/inkrec-replay strokes.json --json | jq .
//!
//! # Replay with the recorded timing
//! ./target/debug/inkrec-replay strokes.json --realtime -v
//! ```

use anyhow::Result;
use clap::Parser;

use inkrec::cli::{execute_replay, initialize, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let ctx = initialize(&args).await?;
    execute_replay(ctx).await?;

    Ok(())
}
