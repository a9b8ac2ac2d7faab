//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for inkrec-replay.

use clap::Parser;
use std::path::PathBuf;

use crate::protocol::Domain;
use crate::settings::{settings_path, TriggerMode};

/// inkrec-replay - Replay recorded pen input through a recognition session
#[derive(Parser, Debug, Clone)]
#[command(name = "inkrec-replay")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON file holding an array of pen events
    ///
    /// Each event is `{"kind": "down" | "move" | "up", "x": .., "y": .., "t": ..}`
    pub input: PathBuf,

    /// Settings file (default: ~/.inkrec/config.toml)
    #[arg(short = 'c', long, env = "INKREC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the trigger policy from settings
    #[arg(short = 't', long, value_enum)]
    pub trigger: Option<TriggerMode>,

    /// Override the recognition domain from settings
    #[arg(short = 'd', long, value_enum)]
    pub domain: Option<Domain>,

    /// Honour the recorded timestamps instead of feeding events back to back
    #[arg(long)]
    pub realtime: bool,

    /// Output events as JSON lines (for scripting/parsing)
    #[arg(long)]
    pub json: bool,

    /// Only output the final recognition result
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Args {
    /// Resolve the input path to an absolute path.
    ///
    /// Returns an error if the path does not exist or is not a file.
    pub fn resolve_input(&self) -> anyhow::Result<PathBuf> {
        let canonical = self.input.canonicalize().map_err(|e| {
            anyhow::anyhow!(
                "Input '{}' does not exist or is not accessible: {}",
                self.input.display(),
                e
            )
        })?;

        if !canonical.is_file() {
            anyhow::bail!("Input '{}' is not a file", canonical.display());
        }

        Ok(canonical)
    }

    /// The settings file to load, falling back to the global one.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(settings_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_args_default_values() {
        let args = Args::parse_from(["inkrec-replay", "strokes.json"]);
        assert_eq!(args.input, PathBuf::from("strokes.json"));
        assert!(args.trigger.is_none());
        assert!(args.domain.is_none());
        assert!(!args.realtime);
        assert!(!args.json);
        assert!(!args.quiet);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "inkrec-replay",
            "strokes.json",
            "-t",
            "quiet-period",
            "--domain",
            "math",
        ]);
        assert_eq!(args.trigger, Some(TriggerMode::QuietPeriod));
        assert_eq!(args.domain, Some(Domain::Math));
    }

    #[test]
    fn test_args_output_modes() {
        let args = Args::parse_from(["inkrec-replay", "strokes.json", "--json", "--quiet"]);
        assert!(args.json);
        assert!(args.quiet);
    }

    #[test]
    fn test_args_missing_input_is_rejected() {
        assert!(Args::try_parse_from(["inkrec-replay"]).is_err());
    }

    #[test]
    fn test_config_path_prefers_flag() {
        let args = Args::parse_from(["inkrec-replay", "in.json", "--config", "/tmp/ink.toml"]);
        assert_eq!(args.config_path(), PathBuf::from("/tmp/ink.toml"));
    }

    #[test]
    fn test_resolve_input() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("events.json");
        std::fs::write(&file, "[]").unwrap();

        let args = Args::parse_from(["inkrec-replay", file.to_str().unwrap()]);
        assert!(args.resolve_input().unwrap().is_absolute());

        let args = Args::parse_from(["inkrec-replay", dir.path().to_str().unwrap()]);
        assert!(args.resolve_input().is_err());

        let missing = dir.path().join("missing.json");
        let args = Args::parse_from(["inkrec-replay", missing.to_str().unwrap()]);
        assert!(args.resolve_input().is_err());
    }
}
