//! TOML-based configuration for recognition sessions.
//!
//! Settings are loaded from `~/.inkrec/config.toml` with environment variable
//! interpolation support for the service credentials.
//!
//! # Usage
//!
//! ```rust,ignore
//! use inkrec::settings::{load_config, settings_path};
//!
//! let config = load_config(&settings_path()).await?;
//! let session = InkSession::new(config);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_with_env_fallback, load_config, settings_path};
pub use schema::{
    HistorySettings, NotificationSettings, PenSettings, RecognitionSettings, ServerSettings,
    SessionConfig, TriggerMode,
};
