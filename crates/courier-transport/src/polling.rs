//! Long-polling update source.

use std::time::Duration;

use async_trait::async_trait;
use courier_core::{
    Bot, Params, RetryConfig, SourceResult, Update, UpdateKind, UpdateSource, Value, deliver,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Settings for [`LongPollSource`].
#[derive(Debug, Clone)]
pub struct LongPollOptions {
    /// Server-side wait per `getUpdates` call.
    pub timeout: Duration,
    /// Maximum updates per call (1..=100).
    pub limit: u32,
    /// Kinds to receive; `None` keeps the server's current setting.
    pub allowed_updates: Option<Vec<UpdateKind>>,
    /// Backoff after failed calls.
    pub retry: RetryConfig,
}

impl Default for LongPollOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            limit: 100,
            allowed_updates: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Fetches updates with `getUpdates`.
///
/// Each batch is confirmed by the next call's `offset`, one past the
/// highest `update_id` seen. Failed calls are retried forever with
/// exponential backoff, stretched to any `retry_after` the API sends.
#[derive(Debug)]
pub struct LongPollSource {
    options: LongPollOptions,
    offset: i64,
}

impl LongPollSource {
    pub fn new(options: LongPollOptions) -> Self {
        Self { options, offset: 0 }
    }

    /// The offset the next call will send.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    fn request_params(&self) -> Params {
        let mut params = Params::new()
            .with("offset", self.offset)
            .with("timeout", self.options.timeout.as_secs() as i64)
            .with("limit", i64::from(self.options.limit));
        if let Some(kinds) = &self.options.allowed_updates {
            let kinds: Vec<Value> = kinds.iter().map(|k| Value::from(k.as_str())).collect();
            params.insert("allowed_updates", kinds);
        }
        params
    }

    /// Validates one raw update and advances the offset past it.
    fn accept(&mut self, raw: Value) -> Option<Update> {
        let update = match raw.into_object() {
            Ok(update) => update,
            Err(other) => {
                warn!(found = other.type_name(), "Skipping update that is not an object");
                return None;
            }
        };
        match update.get_i64("update_id") {
            Ok(id) => {
                self.offset = self.offset.max(id.saturating_add(1));
                Some(update)
            }
            Err(e) => {
                warn!(error = %e, "Skipping update without an integer update_id");
                None
            }
        }
    }
}

#[async_trait]
impl UpdateSource for LongPollSource {
    fn name(&self) -> &'static str {
        "long-poll"
    }

    async fn run(
        &mut self,
        bot: Bot,
        sink: mpsc::Sender<Update>,
        cancel: CancellationToken,
    ) -> SourceResult<()> {
        info!(
            timeout = ?self.options.timeout,
            limit = self.options.limit,
            "Long polling started"
        );
        let mut failures: u32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = bot.get_updates(self.request_params()) => result,
            };

            match result {
                Ok(batch) => {
                    failures = 0;
                    trace!(count = batch.len(), offset = self.offset, "Received updates");
                    for raw in batch {
                        let Some(update) = self.accept(raw) else {
                            continue;
                        };
                        if !deliver(&sink, update, &cancel).await {
                            debug!("Update sink closed or cancelled");
                            return Ok(());
                        }
                    }
                }
                Err(err) => {
                    let delay = self.options.retry.delay_with_hint(failures, err.retry_after());
                    failures = failures.saturating_add(1);
                    warn!(error = %err, attempt = failures, ?delay, "getUpdates failed, retrying");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(offset = self.offset, "Long polling stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::testing::MockTransport;
    use courier_core::{ApiError, Object, TransportError};
    use std::sync::Arc;

    fn batch(ids: &[i64]) -> Value {
        Value::Array(
            ids.iter()
                .map(|&id| {
                    Value::Object(
                        Object::new()
                            .with("update_id", id)
                            .with("message", Object::new().with("text", "x")),
                    )
                })
                .collect(),
        )
    }

    fn fast_options() -> LongPollOptions {
        LongPollOptions {
            timeout: Duration::from_secs(0),
            retry: RetryConfig {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                multiplier: 2.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_request_params() {
        let source = LongPollSource::new(LongPollOptions {
            allowed_updates: Some(vec![UpdateKind::Message, UpdateKind::CallbackQuery]),
            ..Default::default()
        });
        let params = source.request_params();
        assert_eq!(params.get("offset"), Some(&Value::Int(0)));
        assert_eq!(params.get("timeout"), Some(&Value::Int(30)));
        assert_eq!(params.get("limit"), Some(&Value::Int(100)));
        assert_eq!(
            params.get("allowed_updates"),
            Some(&Value::from(vec!["message", "callback_query"]))
        );
    }

    #[tokio::test]
    async fn test_offsets_advance_and_bad_updates_are_skipped() {
        let transport = Arc::new(MockTransport::new().with_latency(Duration::from_millis(1)));
        transport.push_response("getUpdates", Ok(batch(&[10, 12])));
        let mut mixed = batch(&[13]);
        if let Value::Array(items) = &mut mixed {
            items.push(Value::Object(Object::new().with("message", Object::new())));
            items.push(Value::from("garbage"));
        }
        transport.push_response("getUpdates", Ok(mixed));
        transport.push_response(
            "getUpdates",
            Err(ApiError::Transport(TransportError::Timeout)),
        );
        transport.set_response("getUpdates", Ok(Value::Array(Vec::new())));

        let bot = Bot::new(transport.clone());
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut source = LongPollSource::new(fast_options());

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                source.run(bot, tx, cancel).await.unwrap();
                source
            }
        });

        let mut ids = Vec::new();
        for _ in 0..3 {
            let update = rx.recv().await.unwrap();
            ids.push(update.get_i64("update_id").unwrap());
        }
        assert_eq!(ids, vec![10, 12, 13]);

        while transport.call_count("getUpdates") < 5 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        cancel.cancel();
        let source = handle.await.unwrap();
        assert_eq!(source.offset(), 14);

        let offsets: Vec<_> = transport
            .calls_to("getUpdates")
            .iter()
            .map(|p| p.get("offset").cloned())
            .collect();
        assert_eq!(offsets[0], Some(Value::Int(0)));
        assert_eq!(offsets[1], Some(Value::Int(13)));
        assert_eq!(offsets[2], Some(Value::Int(14)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stops_when_sink_closes() {
        let transport = Arc::new(MockTransport::new());
        transport.set_response("getUpdates", Ok(batch(&[1])));
        let bot = Bot::new(transport);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let mut source = LongPollSource::new(fast_options());
        let result = source.run(bot, tx, CancellationToken::new()).await;
        tokio_test::assert_ok!(result);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let transport = Arc::new(MockTransport::new());
        transport.set_response(
            "getUpdates",
            Err(ApiError::Api {
                code: 429,
                description: "Too Many Requests".into(),
                retry_after: Some(3600),
            }),
        );
        let bot = Bot::new(transport.clone());
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let mut source = LongPollSource::new(fast_options());

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { source.run(bot, tx, cancel).await }
        });
        while transport.call_count("getUpdates") == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("source should stop promptly");
        assert!(result.unwrap().is_ok());
        assert_eq!(transport.call_count("getUpdates"), 1);
    }
}
