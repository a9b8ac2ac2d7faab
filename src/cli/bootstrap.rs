//! CLI bootstrap - Wire a session to the loopback backend for replay.
//!
//! `ReplayContext` owns everything a replay needs: the session and the
//! backend task answering its recognizer.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::recognizer::LoopbackBackend;
use crate::session::InkSession;
use crate::settings::{load_config, SessionConfig};

use super::args::Args;

/// Context for a replay run.
pub struct ReplayContext {
    /// The session fed with recorded input
    pub session: InkSession,

    /// In-process recognition service
    backend: LoopbackBackend,

    /// Command-line arguments
    pub args: Args,
}

impl ReplayContext {
    pub fn config(&self) -> SessionConfig {
        self.session.config()
    }

    /// Tear down bindings and the backend task.
    ///
    /// Dropping the session closes the event channel, which ends the output loop.
    pub fn shutdown(self) {
        self.session.close();
        self.backend.shutdown();
    }
}

/// Initialize logging, settings and the session.
pub async fn initialize(args: &Args) -> Result<ReplayContext> {
    init_logging(args.verbose);

    let config_path = args.config_path();
    let config = load_config(&config_path)
        .await
        .with_context(|| format!("Failed to load settings from {}", config_path.display()))?;
    let config = apply_overrides(config, args);

    tracing::info!(
        "[replay] trigger={} domain={}",
        config.trigger(),
        config.recognition.domain
    );

    let session = InkSession::new(config);

    let (recognizer, backend) = LoopbackBackend::recognizer();
    session
        .bind_recognizer(Arc::new(recognizer))
        .await
        .context("Failed to initialise the loopback recognizer")?;

    Ok(ReplayContext {
        session,
        backend,
        args: args.clone(),
    })
}

fn init_logging(verbose: bool) {
    let directive = if verbose { "inkrec=debug" } else { "inkrec=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive));
    // A subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// Apply command-line overrides on top of the loaded settings.
pub fn apply_overrides(mut config: SessionConfig, args: &Args) -> SessionConfig {
    if let Some(trigger) = args.trigger {
        config = config.with_trigger(trigger);
    }
    if let Some(domain) = args.domain {
        config = config.with_domain(domain);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Domain;
    use crate::settings::TriggerMode;
    use clap::Parser;

    #[test]
    fn test_overrides_replace_only_given_values() {
        let config = SessionConfig::default().with_domain(Domain::Math);

        let args = Args::parse_from(["inkrec-replay", "in.json", "-t", "demand"]);
        let config = apply_overrides(config, &args);
        assert_eq!(config.trigger(), TriggerMode::Demand);
        assert_eq!(config.recognition.domain, Domain::Math);
    }

    #[tokio::test]
    async fn test_initialize_binds_loopback() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        let args = Args::parse_from([
            "inkrec-replay",
            "in.json",
            "--config",
            config.to_str().unwrap(),
            "--domain",
            "math",
        ]);

        let ctx = initialize(&args).await.unwrap();
        assert_eq!(ctx.config().recognition.domain, Domain::Math);
        assert!(!ctx.session.available_triggers().is_empty());
        ctx.shutdown();
    }
}
