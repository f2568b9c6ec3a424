//! # Courier Core
//!
//! Core types of the courier bot framework.
//!
//! - **Values**: the dynamic JSON model ([`Value`], [`Object`]) with
//!   dot-path accessors that return errors instead of panicking.
//! - **Updates**: [`Update`], the closed set of [`UpdateKind`]s and the
//!   [`classify`] function.
//! - **Bot handle**: [`Bot`], holding the [`Transport`] and the bot's own
//!   identity, with typed wrappers for the remote API methods.
//! - **Capabilities**: the [`Transport`] and [`UpdateSource`] traits that the
//!   transport crate implements.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐  Update  ┌─────────────┐  classify  ┌────────────┐
//! │ UpdateSource │─────────▶│ worker pool │───────────▶│ dispatcher │──▶ handlers
//! └──────────────┘          └─────────────┘            └────────────┘       │
//!                                                                           ▼
//!                                                     Bot ──▶ Transport::invoke
//! ```
//!
//! The pool and the dispatcher live in `courier-runtime` and
//! `courier-framework`.

pub mod bot;
pub mod error;
pub mod params;
pub mod source;
pub mod transport;
pub mod types;
pub mod update;
pub mod value;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use bot::{Bot, FromApiValue};
pub use error::{
    ApiError, ApiResult, ClassifyError, InputFileError, SourceError, SourceResult,
    TransportError, TransportResult, ValueError, ValueResult,
};
pub use params::{InputFile, Params};
pub use source::{BoxedSource, ChannelSource, UpdateSource, deliver};
pub use transport::{BoxedTransport, RetryConfig, Transport};
pub use types::User;
pub use update::{ClassifiedUpdate, Update, UpdateKind, classify};
pub use value::{Object, Value};
