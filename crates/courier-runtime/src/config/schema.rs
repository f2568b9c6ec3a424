//! Configuration schema definitions.
//!
//! ```toml
//! [bot]
//! api_token = "123456:ABC..."
//! workers = 8
//!
//! [source]
//! mode = "webhook"
//! url = "https://bot.example.com/hook"
//! listen = "0.0.0.0:8443"
//! secret_token = "s3cret"
//!
//! [logging]
//! level = "debug"
//! format = "pretty"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use courier_core::UpdateKind;
use serde::{Deserialize, Serialize};

/// Worker count used when `bot.workers` is unset or zero.
pub const DEFAULT_WORKERS: usize = 5;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CourierConfig {
    #[serde(default)]
    pub bot: BotConfig,

    /// Where updates come from.
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot account and dispatch settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// The API token. Required.
    #[serde(default)]
    pub api_token: String,

    /// Base URL of the remote API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Maximum number of updates dispatched concurrently. Zero means the default.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How long shutdown waits for in-flight handlers.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// HTTP request timeout; must exceed the long-poll timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            api_url: default_api_url(),
            workers: default_workers(),
            drain_timeout_secs: default_drain_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BotConfig {
    /// The worker count, with zero mapped to [`DEFAULT_WORKERS`].
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            DEFAULT_WORKERS
        } else {
            self.workers
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// The token is a credential.
impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.api_token.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("BotConfig")
            .field("api_token", &token)
            .field("api_url", &self.api_url)
            .field("workers", &self.workers)
            .field("drain_timeout_secs", &self.drain_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_drain_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

// =============================================================================
// Update Source
// =============================================================================

/// Update source selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SourceConfig {
    /// Poll `getUpdates`.
    LongPoll(LongPollConfig),
    /// Receive updates on an HTTP endpoint.
    Webhook(WebhookConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::LongPoll(LongPollConfig::default())
    }
}

impl SourceConfig {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::LongPoll(_) => "long-poll",
            Self::Webhook(_) => "webhook",
        }
    }
}

/// Long-polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongPollConfig {
    /// Server-side wait per `getUpdates` call.
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum updates per call (1..=100).
    #[serde(default = "default_poll_limit")]
    pub limit: u32,

    /// Restrict the kinds delivered; `None` keeps the server's setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<UpdateKind>>,

    /// Backoff after failed polls.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout_secs(),
            limit: default_poll_limit(),
            allowed_updates: None,
            retry: RetrySettings::default(),
        }
    }
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_poll_limit() -> u32 {
    100
}

/// Webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Public URL registered with `setWebhook`.
    #[serde(default)]
    pub url: String,

    /// Local address the HTTP server binds.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Route path; defaults to `/bot<token>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` header value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<UpdateKind>>,

    /// Call `deleteWebhook` on shutdown.
    #[serde(default)]
    pub delete_on_shutdown: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            listen: default_listen(),
            path: None,
            secret_token: None,
            allowed_updates: None,
            delete_on_shutdown: false,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8443".to_string()
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetrySettings {
    /// Converts to the core retry config.
    pub fn to_core_retry(&self) -> courier_core::RetryConfig {
        courier_core::RetryConfig {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.backoff_multiplier,
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Log file rotation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Target file when `output = "file"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Rotated files to keep; zero keeps all.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line of each event.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module levels, e.g. `courier_transport = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: BTreeMap::new(),
        }
    }
}

fn default_max_files() -> usize {
    5
}
