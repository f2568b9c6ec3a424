//! Runtime orchestration.
//!
//! A run goes through four phases:
//!
//! 1. **Init**: build the transport, fetch the bot identity (`getMe`), build
//!    the update source. A failed identity fetch ends the run with
//!    [`RuntimeError::Startup`] before any update is read.
//! 2. **Running**: the source feeds a bounded channel; the [`WorkerPool`]
//!    dispatches from it.
//! 3. **Draining**: on cancellation (or when the source closes) the pool
//!    stops taking updates and waits up to `bot.drain_timeout_secs` for
//!    in-flight handlers.
//! 4. **Terminal**: the source task is stopped and joined; its error, if
//!    any, is returned.
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! let runtime = CourierRuntime::builder()
//!     .config_file("courier.toml")
//!     .dispatcher(dispatcher)
//!     .build()?;
//!
//! let stats = runtime.run().await?;
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use courier_core::{Bot, BoxedSource, BoxedTransport, Transport, UpdateSource};
use courier_framework::Dispatcher;
use courier_transport::{LongPollOptions, LongPollSource};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{
    ConfigLoader, CourierConfig, LongPollConfig, SourceConfig, WebhookConfig, validate_config,
};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::scheduler::{PoolStats, WorkerPool};

/// Runs one bot: source, worker pool and dispatcher.
pub struct CourierRuntime {
    config: CourierConfig,
    dispatcher: Dispatcher,
    transport: Option<BoxedTransport>,
    source: Option<BoxedSource>,
}

impl CourierRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Validates the configuration and initializes logging from it.
    pub fn from_config(config: CourierConfig, dispatcher: Dispatcher) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);
        Ok(Self {
            config,
            dispatcher,
            transport: None,
            source: None,
        })
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs until Ctrl+C or SIGTERM, then drains.
    pub async fn run(self) -> RuntimeResult<PoolStats> {
        let cancel = CancellationToken::new();
        let signals = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                wait_for_shutdown().await;
                cancel.cancel();
            }
        });

        info!("Courier runtime starting. Press Ctrl+C to stop.");
        let result = self.run_until(cancel).await;
        signals.abort();
        result
    }

    /// Runs until `cancel` fires or the source ends, then drains.
    pub async fn run_until(self, cancel: CancellationToken) -> RuntimeResult<PoolStats> {
        let Self {
            config,
            dispatcher,
            transport,
            source,
        } = self;

        // Init
        let transport = match transport {
            Some(transport) => transport,
            None => http_transport(&config)?,
        };
        let bot = Bot::new(transport);

        let identity = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Cancelled before startup completed");
                return Ok(PoolStats { drained: true, ..Default::default() });
            }
            identity = bot.fetch_identity() => identity,
        };
        let user = identity.map_err(RuntimeError::Startup)?;
        info!(id = user.id, username = ?user.username, "Bot identity fetched");

        let mut source = match source {
            Some(source) => source,
            None => source_from_config(&config)?,
        };

        // Running
        let workers = config.bot.effective_workers();
        let (tx, rx) = mpsc::channel(workers);
        let source_name = source.name();
        let source_cancel = cancel.child_token();
        let source_task = tokio::spawn({
            let bot = bot.clone();
            let source_cancel = source_cancel.clone();
            async move { source.run(bot, tx, source_cancel).await }
        });
        info!(
            source = source_name,
            workers,
            handlers = dispatcher.handler_count(),
            "Runtime running"
        );

        // Running + Draining
        let pool = WorkerPool::new(workers, config.bot.drain_timeout());
        let stats = pool
            .run(dispatcher.into_service(bot, cancel.clone()), rx, cancel)
            .await;

        // Terminal
        source_cancel.cancel();
        match source_task.await {
            Ok(Ok(())) => {
                info!(source = source_name, "Runtime stopped");
                Ok(stats)
            }
            Ok(Err(e)) => {
                error!(source = source_name, error = %e, "Update source failed");
                Err(RuntimeError::Source(e))
            }
            Err(join) => {
                error!(source = source_name, error = %join, "Update source panicked");
                Err(RuntimeError::SourcePanicked(join.to_string()))
            }
        }
    }
}

impl fmt::Debug for CourierRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CourierRuntime")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("transport", &self.transport.as_ref().map(|t| t.name()))
            .field("source", &self.source.as_ref().map(|s| s.name()))
            .finish()
    }
}

#[cfg(feature = "http-client")]
fn http_transport(config: &CourierConfig) -> RuntimeResult<BoxedTransport> {
    use courier_transport::{HttpTransport, HttpTransportConfig};

    let transport = HttpTransport::new(
        HttpTransportConfig::new(config.bot.api_token.as_str())
            .api_url(config.bot.api_url.as_str())
            .timeout(config.bot.request_timeout()),
    )?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "http-client"))]
fn http_transport(_config: &CourierConfig) -> RuntimeResult<BoxedTransport> {
    Err(RuntimeError::FeatureDisabled {
        feature: "http-client",
        what: "the HTTP transport",
    })
}

fn source_from_config(config: &CourierConfig) -> RuntimeResult<BoxedSource> {
    match &config.source {
        SourceConfig::LongPoll(poll) => Ok(Box::new(long_poll_source(poll))),
        SourceConfig::Webhook(webhook) => webhook_source(webhook, &config.bot.api_token),
    }
}

fn long_poll_source(poll: &LongPollConfig) -> LongPollSource {
    LongPollSource::new(LongPollOptions {
        timeout: Duration::from_secs(poll.timeout_secs),
        limit: poll.limit,
        allowed_updates: poll.allowed_updates.clone(),
        retry: poll.retry.to_core_retry(),
    })
}

#[cfg(feature = "http-server")]
fn webhook_source(webhook: &WebhookConfig, token: &str) -> RuntimeResult<BoxedSource> {
    use crate::config::ConfigError;
    use courier_transport::{WebhookOptions, WebhookSource};

    let listen = webhook.listen.parse().map_err(|_| {
        ConfigError::validation(format!("Invalid listen address: {}", webhook.listen))
    })?;
    let path = webhook
        .path
        .clone()
        .unwrap_or_else(|| format!("/bot{token}"));

    let mut options = WebhookOptions::new(webhook.url.as_str(), listen, path);
    options.secret_token.clone_from(&webhook.secret_token);
    options.allowed_updates.clone_from(&webhook.allowed_updates);
    options.delete_on_shutdown = webhook.delete_on_shutdown;
    Ok(Box::new(WebhookSource::new(options)))
}

#[cfg(not(feature = "http-server"))]
fn webhook_source(_webhook: &WebhookConfig, _token: &str) -> RuntimeResult<BoxedSource> {
    Err(RuntimeError::FeatureDisabled {
        feature: "http-server",
        what: "webhook mode",
    })
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
///
/// If no handler can be installed this never returns; the runtime then
/// only stops when its source ends.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`CourierRuntime`].
///
/// Configuration comes from the [`ConfigLoader`] unless a complete config
/// is given with [`RuntimeBuilder::config`]. The transport and source are
/// built from configuration unless overridden.
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    config: Option<CourierConfig>,
    dispatcher: Dispatcher,
    transport: Option<BoxedTransport>,
    source: Option<BoxedSource>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            config: None,
            dispatcher: Dispatcher::default(),
            transport: None,
            source: None,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Merges values under files and environment variables.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    /// Uses `config` as is; files and environment variables are not read.
    pub fn config(mut self, config: CourierConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Replaces the HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the configured update source.
    pub fn source(mut self, source: impl UpdateSource) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn build(self) -> RuntimeResult<CourierRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.load()?,
        };
        let mut runtime = CourierRuntime::from_config(config, self.dispatcher)?;
        runtime.transport = self.transport;
        runtime.source = self.source;
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use async_trait::async_trait;
    use courier_core::testing::MockTransport;
    use courier_core::{ApiError, ChannelSource, SourceError, SourceResult, Update, Value};
    use courier_framework::matchers::{has_command, has_text};
    use courier_framework::{Context, Flow, HandlerResult};

    fn config() -> CourierConfig {
        let mut config = CourierConfig::default();
        config.bot.api_token = "123:test".into();
        config.bot.workers = 2;
        config
    }

    fn start_update(id: i64) -> Update {
        Value::from(serde_json::json!({
            "update_id": id,
            "message": {
                "text": "/start",
                "chat": {"id": 42, "type": "private"},
                "entities": [{"type": "bot_command", "offset": 0, "length": 6}]
            }
        }))
        .into_object()
        .unwrap()
    }

    fn greeter() -> Dispatcher {
        Dispatcher::builder()
            .on_message(has_command("/start"), |ctx: Arc<Context>| async move {
                ctx.reply_text("hello").await?;
                HandlerResult::Ok(Flow::Stop)
            })
            .build()
    }

    struct FailingSource;

    #[async_trait]
    impl UpdateSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(
            &mut self,
            _bot: Bot,
            _sink: mpsc::Sender<Update>,
            _cancel: CancellationToken,
        ) -> SourceResult<()> {
            Err(SourceError::Server("listener died".into()))
        }
    }

    #[tokio::test]
    async fn test_end_to_end_reply() {
        let transport = Arc::new(MockTransport::new().with_bot_user(1, "courier_bot"));
        let (tx, source) = ChannelSource::channel(4);
        let runtime = CourierRuntime::builder()
            .config(config())
            .dispatcher(greeter())
            .transport(transport.clone())
            .source(source)
            .build()
            .unwrap();

        tx.send(start_update(1)).await.unwrap();
        drop(tx);
        let stats = tokio_test::assert_ok!(runtime.run_until(CancellationToken::new()).await);

        assert_eq!(stats.received, 1);
        assert_eq!(stats.completed, 1);
        assert!(stats.drained);
        assert_eq!(transport.call_count("getMe"), 1);
        let sent = transport.calls_to("sendMessage");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].get("chat_id"), Some(&Value::Int(42)));
        assert_eq!(sent[0].get("text"), Some(&Value::from("hello")));
    }

    #[tokio::test]
    async fn test_startup_failure_reads_no_updates() {
        let transport = Arc::new(MockTransport::new());
        transport.set_response("getMe", Err(ApiError::Other("unauthorized".into())));
        let (tx, source) = ChannelSource::channel(4);
        tx.send(start_update(1)).await.unwrap();

        let runtime = CourierRuntime::builder()
            .config(config())
            .dispatcher(greeter())
            .transport(transport.clone())
            .source(source)
            .build()
            .unwrap();

        let err = tokio_test::assert_err!(runtime.run_until(CancellationToken::new()).await);
        assert!(matches!(err, RuntimeError::Startup(_)));
        assert_eq!(transport.call_count("sendMessage"), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_runtime() {
        let transport = Arc::new(MockTransport::new().with_bot_user(1, "courier_bot"));
        let (tx, source) = ChannelSource::channel(4);
        let runtime = CourierRuntime::builder()
            .config(config())
            .dispatcher(
                Dispatcher::builder()
                    .on_message(has_text(), |_ctx: Arc<Context>| async {
                        HandlerResult::Ok(Flow::Continue)
                    })
                    .build(),
            )
            .transport(transport)
            .source(source)
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(runtime.run_until(cancel.clone()));
        tx.send(start_update(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.completed, 1);
        assert!(stats.drained);
        drop(tx);
    }

    #[tokio::test]
    async fn test_source_error_is_returned() {
        let runtime = CourierRuntime::builder()
            .config(config())
            .transport(Arc::new(MockTransport::new().with_bot_user(1, "courier_bot")))
            .source(FailingSource)
            .build()
            .unwrap();

        let err = tokio_test::assert_err!(runtime.run_until(CancellationToken::new()).await);
        assert!(matches!(err, RuntimeError::Source(SourceError::Server(_))));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let err = CourierRuntime::builder()
            .config(CourierConfig::default())
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_sources_from_config() {
        let mut config = config();
        assert_eq!(source_from_config(&config).unwrap().name(), "long-poll");

        config.source = SourceConfig::Webhook(WebhookConfig {
            url: "https://example.com/hook".into(),
            ..Default::default()
        });
        #[cfg(feature = "http-server")]
        assert_eq!(source_from_config(&config).unwrap().name(), "webhook");
        #[cfg(not(feature = "http-server"))]
        assert!(source_from_config(&config).is_err());
    }
}
