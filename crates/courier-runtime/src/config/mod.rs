//! Runtime configuration.
//!
//! Configuration is layered with figment (defaults, files, environment)
//! and validated before the runtime starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, CourierConfig, DEFAULT_WORKERS, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, LongPollConfig, RetrySettings, SourceConfig, SpanEventConfig, WebhookConfig,
};
pub use validation::validate_config;
