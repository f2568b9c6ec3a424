//! Handlers: the business logic run for matched updates.
//!
//! Any `Fn(Arc<Context>) -> impl Future<Output = HandlerResult>` is a
//! [`Handler`], so plain async closures and functions work directly:
//!
//! ```rust,ignore
//! async fn start(ctx: Arc<Context>) -> HandlerResult {
//!     ctx.reply_text("Welcome!").await?;
//!     Ok(Flow::Stop)
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::BoxError;

/// What the chain should do after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Keep evaluating the remaining handlers.
    #[default]
    Continue,
    /// Skip the remaining handlers for this update.
    Stop,
}

impl Flow {
    pub fn is_stop(self) -> bool {
        self == Self::Stop
    }
}

/// The result of a handler invocation.
pub type HandlerResult = Result<Flow, BoxError>;

/// Processes one matched update.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(ctx))
    }
}

/// A type-erased handler that can be stored in a chain.
pub type BoxedHandler = Arc<dyn Handler>;

/// Boxes a handler.
pub fn into_handler<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}
