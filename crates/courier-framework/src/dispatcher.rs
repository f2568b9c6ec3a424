//! The update dispatcher.
//!
//! A [`Dispatcher`] owns one [`HandlerChain`] per [`UpdateKind`]. It is
//! built once with a [`DispatcherBuilder`] and is immutable afterwards;
//! cloning it only bumps a reference count, so every dispatch task can hold
//! its own copy.
//!
//! Dispatching one update:
//!
//! 1. The update is classified. A classification failure is returned
//!    immediately and no handler runs.
//! 2. The chain for the classified kind is walked (see [`HandlerChain::run`]).
//! 3. The first handler error is returned, otherwise a [`DispatchReport`].
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::builder()
//!     .on_message(has_command("/start").and(is_private()), start)
//!     .on_message(has_text(), echo)
//!     .on_callback_query(callback_data("vote:"), vote)
//!     .build();
//! ```

use std::fmt;
use std::sync::Arc;

use courier_core::{Bot, Update, UpdateKind, classify};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span};

use crate::chain::HandlerChain;
use crate::context::Context;
use crate::error::DispatchResult;
use crate::handler::Handler;
use crate::matcher::Matcher;
use crate::service::DispatchService;

type Chains = [HandlerChain; UpdateKind::COUNT];

/// Summary of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub update_id: Option<i64>,
    pub kind: UpdateKind,
    /// Number of handlers that ran.
    pub invoked: usize,
    /// Whether a handler stopped the chain.
    pub stopped: bool,
}

// =============================================================================
// Builder
// =============================================================================

/// Collects handler registrations before dispatch starts.
pub struct DispatcherBuilder {
    chains: Chains,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates `on_<kind>` shortcuts for [`DispatcherBuilder::on`].
macro_rules! on_kind {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            #[doc = concat!("Registers a handler for `", stringify!($kind), "` updates.")]
            pub fn $name(self, matcher: Matcher, handler: impl Handler) -> Self {
                self.on(UpdateKind::$kind, matcher, handler)
            }
        )*
    };
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            chains: std::array::from_fn(|_| HandlerChain::new()),
        }
    }

    /// Appends `(matcher, handler)` to the chain for `kind`.
    pub fn on(mut self, kind: UpdateKind, matcher: Matcher, handler: impl Handler) -> Self {
        self.chains[kind.index()].push(matcher, handler);
        self
    }

    on_kind!(
        on_message => Message,
        on_edited_message => EditedMessage,
        on_channel_post => ChannelPost,
        on_edited_channel_post => EditedChannelPost,
        on_inline_query => InlineQuery,
        on_chosen_inline_result => ChosenInlineResult,
        on_callback_query => CallbackQuery,
        on_shipping_query => ShippingQuery,
        on_pre_checkout_query => PreCheckoutQuery,
        on_poll => Poll,
        on_poll_answer => PollAnswer,
        on_my_chat_member => MyChatMember,
        on_chat_member => ChatMember,
    );

    /// Freezes the registrations.
    pub fn build(self) -> Dispatcher {
        let dispatcher = Dispatcher {
            chains: Arc::new(self.chains),
        };
        debug!(handlers = dispatcher.handler_count(), "Dispatcher built");
        dispatcher
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Routes updates to the handler chain of their kind.
#[derive(Clone)]
pub struct Dispatcher {
    chains: Arc<Chains>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        DispatcherBuilder::new().build()
    }
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// The chain registered for `kind`.
    pub fn chain(&self, kind: UpdateKind) -> &HandlerChain {
        &self.chains[kind.index()]
    }

    /// Total number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.chains.iter().map(HandlerChain::len).sum()
    }

    /// Classifies `update` and runs its kind's chain.
    pub async fn dispatch(
        &self,
        bot: &Bot,
        update: Update,
        cancel: CancellationToken,
    ) -> DispatchResult<DispatchReport> {
        let classified = classify(update)?;
        let (kind, update_id) = (classified.kind, classified.update_id);
        let span = debug_span!("dispatch", ?update_id, %kind);

        let ctx = Arc::new(Context::new(bot.clone(), classified, cancel));
        let outcome = self.chain(kind).run(ctx).instrument(span).await?;

        Ok(DispatchReport {
            update_id,
            kind,
            invoked: outcome.invoked,
            stopped: outcome.stopped,
        })
    }

    /// Wraps this dispatcher in a tower service bound to `bot`.
    pub fn into_service(self, bot: Bot, cancel: CancellationToken) -> DispatchService {
        DispatchService::new(self, bot, cancel)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in UpdateKind::ALL {
            let len = self.chain(kind).len();
            if len > 0 {
                map.entry(&kind.as_str(), &len);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::handler::{Flow, HandlerResult};
    use crate::matchers::{always, has_command, is_private, never};
    use courier_core::testing::MockTransport;
    use courier_core::{ClassifyError, Value};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bot() -> Bot {
        Bot::new(Arc::new(MockTransport::new()))
    }

    fn update(json: serde_json::Value) -> Update {
        Value::from(json).into_object().unwrap()
    }

    fn counting(counter: &Arc<AtomicUsize>, flow: Flow) -> impl Handler {
        let counter = Arc::clone(counter);
        move |_ctx: Arc<Context>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { HandlerResult::Ok(flow) }
        }
    }

    #[tokio::test]
    async fn test_start_command_in_private_chat() {
        let hits = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::builder()
            .on_message(has_command("/start").and(is_private()), counting(&hits, Flow::Stop))
            .build();

        let report = dispatcher
            .dispatch(
                &bot(),
                update(json!({"message": {
                    "text": "/start",
                    "chat": {"type": "private"},
                    "entities": [{"offset": 0, "length": 6}]
                }})),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(report.kind, UpdateKind::Message);
        assert_eq!(report.invoked, 1);
        assert!(report.stopped);
    }

    #[tokio::test]
    async fn test_kind_without_handlers_is_noop() {
        let hits = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::builder()
            .on_message(always(), counting(&hits, Flow::Continue))
            .build();

        let report = dispatcher
            .dispatch(
                &bot(),
                update(json!({"callback_query": {}})),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.kind, UpdateKind::CallbackQuery);
        assert_eq!(report.invoked, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unclassified_update_runs_nothing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::builder()
            .on_message(always(), counting(&hits, Flow::Continue))
            .build();

        let err = tokio_test::assert_err!(
            dispatcher
                .dispatch(&bot(), update(json!({"update_id": 1})), CancellationToken::new())
                .await
        );

        assert!(matches!(
            err,
            DispatchError::Classify(ClassifyError::Unclassified { .. })
        ));
        assert_eq!(err.kind(), None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_only_the_kinds_chain_runs() {
        let message_hits = Arc::new(AtomicUsize::new(0));
        let edited_hits = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::builder()
            .on_message(always(), counting(&message_hits, Flow::Continue))
            .on_edited_message(always(), counting(&edited_hits, Flow::Continue))
            .on_edited_message(never(), counting(&edited_hits, Flow::Continue))
            .build();

        let report = dispatcher
            .dispatch(
                &bot(),
                update(json!({"update_id": 4, "edited_message": {"text": "x"}})),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.update_id, Some(4));
        assert_eq!(report.invoked, 1);
        assert_eq!(message_hits.load(Ordering::SeqCst), 0);
        assert_eq!(edited_hits.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.handler_count(), 3);
        assert_eq!(dispatcher.chain(UpdateKind::EditedMessage).len(), 2);
    }

    #[tokio::test]
    async fn test_handlers_see_cancellation() {
        let dispatcher = Dispatcher::builder()
            .on_poll(always(), |ctx: Arc<Context>| async move {
                HandlerResult::Ok(if ctx.is_cancelled() {
                    Flow::Stop
                } else {
                    Flow::Continue
                })
            })
            .build();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = dispatcher
            .dispatch(&bot(), update(json!({"poll": {"id": "1"}})), cancel)
            .await
            .unwrap();
        assert!(report.stopped);
    }
}
