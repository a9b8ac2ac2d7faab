//! Settings schema definitions for inkrec sessions.
//!
//! All settings structs use `#[serde(default)]` to allow partial configuration files.
//! Missing fields are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::model::PenStyle;
use crate::protocol::Domain;

/// Policy deciding when captured strokes are submitted for recognition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Submit as soon as a stroke is finalized
    #[default]
    PenUp,
    /// Submit once no new stroke has been completed for the quiet period
    QuietPeriod,
    /// Submit only when the host asks for it
    Demand,
}

impl TriggerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::PenUp => "pen_up",
            TriggerMode::QuietPeriod => "quiet_period",
            TriggerMode::Demand => "demand",
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root configuration for a recognition session.
///
/// Loaded from `~/.inkrec/config.toml` with environment variable interpolation support.
/// Version field enables future migrations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Schema version for migrations
    pub version: u32,

    /// Recognition trigger and pass-through parameters
    pub recognition: RecognitionSettings,

    /// Observer notification settings
    pub notification: NotificationSettings,

    /// Undo/redo settings
    pub history: HistorySettings,

    /// Default pen settings
    pub pen: PenSettings,

    /// Recognition service endpoint
    pub server: ServerSettings,
}

/// Recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Recognition domain: "math" | "text"
    pub domain: Domain,

    /// Trigger policy: "pen_up" | "quiet_period" | "demand"
    pub trigger: TriggerMode,

    /// Inactivity window before a quiet-period submission fires
    pub quiet_period_ms: u64,

    /// How long a single request may stay unanswered
    pub request_timeout_ms: u64,

    /// Domain parameters, forwarded to the service untouched
    pub parameters: serde_json::Value,
}

/// Observer notification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationSettings {
    /// Coalescing window for observer callbacks in quiet-period mode
    pub quiet_period_ms: u64,
}

/// Undo/redo settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistorySettings {
    /// Maximum number of retained entries (oldest are evicted first)
    pub max_size: usize,
}

/// Pen settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PenSettings {
    /// Style applied to new strokes
    pub style: PenStyle,

    /// Points closer than this to the previous point are dropped (0 keeps all)
    pub min_point_distance: f64,
}

/// Recognition service endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// "https" | "wss" | ...
    pub scheme: String,

    /// Service host name
    pub host: String,

    /// Application key (supports $ENV_VAR syntax)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_key: Option<String>,
}

// =============================================================================
// Default implementations
// =============================================================================

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: 1,
            recognition: RecognitionSettings::default(),
            notification: NotificationSettings::default(),
            history: HistorySettings::default(),
            pen: PenSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            domain: Domain::Text,
            trigger: TriggerMode::PenUp,
            quiet_period_ms: 300,
            request_timeout_ms: 10_000,
            parameters: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            quiet_period_ms: 100,
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { max_size: 20 }
    }
}

impl Default for PenSettings {
    fn default() -> Self {
        Self {
            style: PenStyle::default(),
            min_point_distance: 0.0,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            scheme: "wss".to_string(),
            host: "localhost".to_string(),
            application_key: None,
        }
    }
}

impl SessionConfig {
    /// Set the trigger policy
    pub fn with_trigger(mut self, trigger: TriggerMode) -> Self {
        self.recognition.trigger = trigger;
        self
    }

    /// Set the recognition domain
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.recognition.domain = domain;
        self
    }

    /// Set the submission quiet period
    pub fn with_quiet_period(mut self, period: Duration) -> Self {
        self.recognition.quiet_period_ms = period.as_millis() as u64;
        self
    }

    /// Set the observer notification quiet period
    pub fn with_notification_quiet_period(mut self, period: Duration) -> Self {
        self.notification.quiet_period_ms = period.as_millis() as u64;
        self
    }

    pub fn trigger(&self) -> TriggerMode {
        self.recognition.trigger
    }

    pub fn recognition_quiet_period(&self) -> Duration {
        Duration::from_millis(self.recognition.quiet_period_ms)
    }

    pub fn notification_quiet_period(&self) -> Duration {
        Duration::from_millis(self.notification.quiet_period_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.recognition.request_timeout_ms)
    }
}
