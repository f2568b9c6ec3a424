//! Tower integration.
//!
//! [`DispatchService`] binds a [`Dispatcher`] to a bot and implements
//! `tower::Service<Update>`, so tower middleware (timeouts, concurrency
//! limits, tracing) can wrap dispatch:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use tower::timeout::TimeoutLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(TimeoutLayer::new(Duration::from_secs(30)))
//!     .service(dispatcher.into_service(bot, cancel));
//! ```

use std::task::{Context, Poll};

use courier_core::{Bot, Update};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tower::Service;

use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::error::DispatchError;

/// A [`Dispatcher`] bound to a bot, as a tower service.
///
/// Always ready; each call dispatches one update.
#[derive(Clone, Debug)]
pub struct DispatchService {
    dispatcher: Dispatcher,
    bot: Bot,
    cancel: CancellationToken,
}

impl DispatchService {
    pub fn new(dispatcher: Dispatcher, bot: Bot, cancel: CancellationToken) -> Self {
        Self {
            dispatcher,
            bot,
            cancel,
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

impl Service<Update> for DispatchService {
    type Response = DispatchReport;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, update: Update) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            this.dispatcher
                .dispatch(&this.bot, update, this.cancel.clone())
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context as UpdateContext;
    use crate::handler::{Flow, HandlerResult};
    use crate::matchers::has_text;
    use courier_core::testing::MockTransport;
    use courier_core::{Object, UpdateKind};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_service_dispatches_updates() {
        let dispatcher = Dispatcher::builder()
            .on_message(has_text(), |_ctx: Arc<UpdateContext>| async {
                HandlerResult::Ok(Flow::Stop)
            })
            .build();
        let bot = Bot::new(Arc::new(MockTransport::new()));
        let service = dispatcher.into_service(bot, CancellationToken::new());

        let update = Object::new()
            .with("update_id", 9)
            .with("message", Object::new().with("text", "hi"));
        let report = tokio_test::assert_ok!(service.clone().oneshot(update).await);
        assert_eq!(report.kind, UpdateKind::Message);
        assert_eq!(report.update_id, Some(9));
        assert!(report.stopped);

        let err = tokio_test::assert_err!(service.oneshot(Object::new()).await);
        assert!(matches!(err, DispatchError::Classify(_)));
    }
}
