//! Ordered (matcher, handler) chains.
//!
//! A [`HandlerChain`] is append-only. It is filled while the dispatcher is
//! being built and only read afterwards, so concurrent dispatch tasks share
//! it without locking.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::context::Context;
use crate::error::{DispatchError, DispatchResult};
use crate::handler::{BoxedHandler, Handler, into_handler};
use crate::matcher::Matcher;

#[derive(Clone)]
struct ChainEntry {
    matcher: Matcher,
    handler: BoxedHandler,
}

/// How a chain walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainOutcome {
    /// Number of handlers that ran.
    pub invoked: usize,
    /// Whether a handler returned [`Flow::Stop`](crate::Flow::Stop).
    pub stopped: bool,
}

/// Handlers for one update kind, in registration order.
#[derive(Clone, Default)]
pub struct HandlerChain {
    entries: Vec<ChainEntry>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pair to the end of the chain.
    pub fn push(&mut self, matcher: Matcher, handler: impl Handler) {
        self.push_boxed(matcher, into_handler(handler));
    }

    pub fn push_boxed(&mut self, matcher: Matcher, handler: BoxedHandler) {
        self.entries.push(ChainEntry { matcher, handler });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walks the chain for one update.
    ///
    /// Each handler whose matcher accepts `ctx` runs in order. The walk ends
    /// at the first handler that stops or fails; a failure is returned as
    /// [`DispatchError::Handler`]. An empty chain is a successful no-op.
    pub async fn run(&self, ctx: Arc<Context>) -> DispatchResult<ChainOutcome> {
        let mut outcome = ChainOutcome::default();

        for (index, entry) in self.entries.iter().enumerate() {
            let matcher = entry.matcher.name().unwrap_or("unnamed");
            if !entry.matcher.matches(&ctx) {
                trace!(index, matcher, "Matcher rejected update, skipping");
                continue;
            }

            trace!(index, matcher, "Executing handler");
            outcome.invoked += 1;
            match entry.handler.call(Arc::clone(&ctx)).await {
                Ok(flow) if flow.is_stop() => {
                    debug!(index, matcher, "Handler stopped the chain");
                    outcome.stopped = true;
                    break;
                }
                Ok(_) => {}
                Err(source) => {
                    return Err(DispatchError::Handler {
                        kind: ctx.kind(),
                        index,
                        source,
                    });
                }
            }
        }

        Ok(outcome)
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::handler::{Flow, HandlerResult};
    use crate::matchers::{always, never};
    use courier_core::testing::MockTransport;
    use courier_core::{Bot, Object, UpdateKind, classify};
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> Arc<Context> {
        let update =
            classify(Object::new().with(UpdateKind::Message.as_str(), Object::new())).unwrap();
        Arc::new(Context::new(
            Bot::new(Arc::new(MockTransport::new())),
            update,
            CancellationToken::new(),
        ))
    }

    /// A handler that appends `label` to `log` and returns `result`.
    fn recording(
        log: &Arc<Mutex<Vec<&'static str>>>,
        label: &'static str,
        flow: Flow,
    ) -> impl Handler {
        let log = Arc::clone(log);
        move |_ctx: Arc<Context>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(label);
                HandlerResult::Ok(flow)
            }
        }
    }

    #[tokio::test]
    async fn test_stop_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        chain.push(always(), recording(&log, "h1", Flow::Stop));
        chain.push(always(), recording(&log, "h2", Flow::Continue));

        let outcome = chain.run(ctx()).await.unwrap();
        assert_eq!(*log.lock(), vec!["h1"]);
        assert_eq!(
            outcome,
            ChainOutcome {
                invoked: 1,
                stopped: true
            }
        );
    }

    #[tokio::test]
    async fn test_continue_runs_all_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        chain.push(always(), recording(&log, "h1", Flow::Continue));
        chain.push(always(), recording(&log, "h2", Flow::Continue));

        let outcome = chain.run(ctx()).await.unwrap();
        assert_eq!(*log.lock(), vec!["h1", "h2"]);
        assert_eq!(outcome.invoked, 2);
        assert!(!outcome.stopped);
    }

    #[tokio::test]
    async fn test_rejected_matcher_skips_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        chain.push(never(), recording(&log, "h1", Flow::Stop));
        chain.push(always(), recording(&log, "h2", Flow::Continue));

        let outcome = chain.run(ctx()).await.unwrap();
        assert_eq!(*log.lock(), vec!["h2"]);
        assert_eq!(outcome.invoked, 1);
    }

    #[tokio::test]
    async fn test_error_halts_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        chain.push(always(), recording(&log, "h1", Flow::Continue));
        chain.push(always(), |_ctx: Arc<Context>| async {
            Err::<Flow, BoxError>("database unavailable".into())
        });
        chain.push(always(), recording(&log, "h3", Flow::Continue));

        let err = chain.run(ctx()).await.unwrap_err();
        assert_eq!(*log.lock(), vec!["h1"]);
        match err {
            DispatchError::Handler {
                kind,
                index,
                source,
            } => {
                assert_eq!(kind, UpdateKind::Message);
                assert_eq!(index, 1);
                assert_eq!(source.to_string(), "database unavailable");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_is_noop() {
        let chain = HandlerChain::new();
        assert!(chain.is_empty());
        let outcome = chain.run(ctx()).await.unwrap();
        assert_eq!(outcome, ChainOutcome::default());
    }
}
