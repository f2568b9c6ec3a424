//! # Courier Runtime
//!
//! Runs a bot built with `courier-framework`:
//!
//! - [`config`]: layered configuration with figment
//! - [`logging`]: `tracing-subscriber` setup driven by configuration
//! - [`WorkerPool`]: bounded concurrent dispatch with graceful drain
//! - [`CourierRuntime`]: startup, signal handling and shutdown
//!
//! ## Transport Features
//!
//! - `http-client` *(default)*: build the HTTP transport from `bot.api_url`
//! - `http-server` *(default)*: allow `source.mode = "webhook"`
//!
//! ```ignore
//! use courier_framework::prelude::*;
//! use courier_runtime::CourierRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let dispatcher = Dispatcher::builder()
//!         .on_message(has_command("/start"), start)
//!         .build();
//!
//!     CourierRuntime::builder()
//!         .dispatcher(dispatcher)
//!         .build()?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod scheduler;

pub use config::{ConfigError, ConfigLoader, ConfigResult, CourierConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{CourierRuntime, RuntimeBuilder};
pub use scheduler::{PoolStats, WorkerPool};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
