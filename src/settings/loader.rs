//! Settings loading and environment variable interpolation.
//!
//! Settings live in `~/.inkrec/config.toml` unless a path is given. String
//! fields may reference `$VAR` or `${VAR}` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::schema::SessionConfig;

/// Environment variable consulted when no application key is configured.
pub const APPLICATION_KEY_ENV: &str = "INKREC_APPLICATION_KEY";

/// Get the path to the global settings file.
pub fn settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".inkrec")
        .join("config.toml")
}

/// Load a session config from a TOML file, resolving env var references.
///
/// A missing file yields the defaults.
pub async fn load_config(path: &Path) -> Result<SessionConfig> {
    if !path.exists() {
        tracing::debug!("Config file not found at {:?}, using defaults", path);
        return Ok(SessionConfig::default());
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .context("Failed to read config file")?;

    let mut config: SessionConfig =
        toml::from_str(&contents).context("Failed to deserialize config")?;

    resolve_env_vars(&mut config);

    tracing::info!("Loaded config from {:?}", path);
    Ok(config)
}

/// Resolve $ENV_VAR references in string fields.
fn resolve_env_vars(config: &mut SessionConfig) {
    if let Some(v) = config.server.application_key.as_mut() {
        if let Some(resolved) = resolve_env_ref(v) {
            *v = resolved;
        }
    }

    config.server.application_key =
        get_with_env_fallback(&config.server.application_key, &[APPLICATION_KEY_ENV], None);
}

/// Resolve a $ENV_VAR or ${ENV_VAR} reference.
///
/// Returns `Some(resolved)` if the value starts with `$` and the env var exists.
/// Returns `None` if no env var reference or env var not set.
fn resolve_env_ref(value: &str) -> Option<String> {
    let trimmed = value.trim();

    if let Some(rest) = trimmed.strip_prefix('$') {
        let var_name = rest
            .strip_prefix('{')
            .and_then(|inner| inner.strip_suffix('}'))
            .unwrap_or(rest);

        return std::env::var(var_name).ok();
    }

    None
}

/// Get a setting value with environment variable fallback.
///
/// Priority order:
/// 1. Settings value (if set and non-empty)
/// 2. Environment variable (first match from list)
/// 3. Default value
pub fn get_with_env_fallback(
    setting: &Option<String>,
    env_vars: &[&str],
    default: Option<String>,
) -> Option<String> {
    if let Some(v) = setting {
        if !v.is_empty() {
            return Some(v.clone());
        }
    }

    for env_var in env_vars {
        if let Ok(v) = std::env::var(env_var) {
            if !v.is_empty() {
                return Some(v);
            }
        }
    }

    default
}
