//! # Courier Transport
//!
//! Network implementations of the capabilities defined in `courier-core`.
//!
//! ## Features
//!
//! - `http-client`: [`HttpTransport`], the `reqwest` API client
//! - `http-server`: [`WebhookSource`], an `axum` webhook endpoint
//! - `full`: both
//!
//! [`LongPollSource`] only needs a [`Transport`](courier_core::Transport),
//! so it is always available.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  courier-runtime    │  (worker pool, lifecycle)
//! ├─────────────────────┤
//! │  courier-core       │  (Transport / UpdateSource traits)
//! ├─────────────────────┤
//! │  courier-transport  │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (HTTP)     │
//! └─────────────────────┘
//! ```
//!
//! ```rust,ignore
//! use courier_transport::{HttpTransport, HttpTransportConfig, LongPollSource};
//!
//! let transport = HttpTransport::new(HttpTransportConfig::new(token))?;
//! let source = LongPollSource::new(Default::default());
//! ```

#[cfg(feature = "http-client")]
pub mod http;

pub mod polling;

#[cfg(feature = "http-server")]
pub mod webhook;

#[cfg(feature = "http-client")]
pub use http::{DEFAULT_API_URL, HttpTransport, HttpTransportConfig};

pub use polling::{LongPollOptions, LongPollSource};

#[cfg(feature = "http-server")]
pub use webhook::{SECRET_TOKEN_HEADER, WebhookOptions, WebhookSource};
