//! # Courier Framework
//!
//! Update routing for the courier bot framework.
//!
//! - [`Matcher`] and the [`matchers`] library decide whether a handler runs.
//! - [`Handler`]s hold the business logic and return a [`Flow`].
//! - [`HandlerChain`] evaluates (matcher, handler) pairs in order.
//! - [`Dispatcher`] classifies an update and runs its kind's chain.
//! - [`DispatchService`] exposes dispatch as a `tower::Service`.

pub mod chain;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod matcher;
pub mod matchers;
pub mod service;

pub use chain::{ChainOutcome, HandlerChain};
pub use context::Context;
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherBuilder};
pub use error::{BoxError, DispatchError, DispatchResult};
pub use handler::{BoxedHandler, Flow, Handler, HandlerResult, into_handler};
pub use matcher::{CheckFn, Matcher};
pub use service::DispatchService;

/// Prelude for common imports.
pub mod prelude {
    pub use super::matchers::*;
    pub use super::{
        BoxError, Context, DispatchError, DispatchReport, Dispatcher, Flow, Handler,
        HandlerResult, Matcher,
    };
}
