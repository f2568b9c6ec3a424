//! # Courier
//!
//! A concurrent client framework for the Telegram Bot API.
//!
//! ## Overview
//!
//! Updates arrive from a long-poll loop or a webhook, are classified into
//! one of thirteen kinds, and are dispatched on a bounded worker pool to
//! the handler chain registered for that kind.
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌────────────┐     ┌──────────────────┐
//! │ UpdateSource │────▶│ worker pool │────▶│ Dispatcher │────▶│ chain[kind]      │──▶ Bot API
//! │ (poll / hook)│     │ (N workers) │     │ (classify) │     │ matcher→handler… │
//! └──────────────┘     └─────────────┘     └────────────┘     └──────────────────┘
//! ```
//!
//! - **Runtime**: configuration, logging, startup and graceful shutdown
//! - **Dispatcher**: one ordered handler chain per update kind
//! - **Matchers**: predicates over the update context
//! - **Handlers**: async functions returning [`Flow`](prelude::Flow)
//! - **Bot**: the API handle, shared by every handler
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//! use std::sync::Arc;
//!
//! async fn start(ctx: Arc<Context>) -> HandlerResult {
//!     ctx.reply_text("Hello!").await?;
//!     Ok(Flow::Stop)
//! }
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
//!
//! ## Features
//!
//! - `toml-config` *(default)*: read `courier.toml`
//! - `yaml-config`: read `courier.yaml`
//! - `json-log`: JSON log output
//! - `http-client` *(default)*: the `reqwest` API client
//! - `http-server` *(default)*: the `axum` webhook source
//! - `test-util`: `courier::core::testing::MockTransport`

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;
pub use courier_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use courier_runtime::{CourierConfig, CourierRuntime, RuntimeError};

    // Dispatch - for registering handlers
    pub use courier_framework::prelude::*;

    // Bot and data model - for calling the API in handlers
    pub use courier_core::{ApiError, Bot, Object, Params, Update, UpdateKind, User, Value};
}
