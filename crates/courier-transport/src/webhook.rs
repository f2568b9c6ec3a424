//! Webhook update source.
//!
//! [`WebhookSource`] binds a local HTTP server, registers its public URL with
//! `setWebhook` and forwards every POSTed update to the worker pool.
//!
//! Responses:
//!
//! | Status | When |
//! |--------|------|
//! | 200 | the update was queued |
//! | 400 | the body is not a JSON object |
//! | 401 | the secret token header is missing or wrong |
//! | 503 | the pool has stopped accepting updates |

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use courier_core::{
    Bot, Params, SourceError, SourceResult, Update, UpdateKind, UpdateSource, Value, deliver,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Header carrying the secret registered with `setWebhook`.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Settings for [`WebhookSource`].
#[derive(Clone)]
pub struct WebhookOptions {
    /// Public URL the API will POST to.
    pub url: String,
    /// Local bind address.
    pub listen: SocketAddr,
    /// Route path, usually `/bot<token>`.
    pub path: String,
    pub secret_token: Option<String>,
    pub allowed_updates: Option<Vec<UpdateKind>>,
    /// Call `deleteWebhook` after the server stops.
    pub delete_on_shutdown: bool,
}

impl WebhookOptions {
    pub fn new(url: impl Into<String>, listen: SocketAddr, path: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            listen,
            path: path.into(),
            secret_token: None,
            allowed_updates: None,
            delete_on_shutdown: false,
        }
    }
}

// The path and secret may both contain credentials.
impl std::fmt::Debug for WebhookOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookOptions")
            .field("listen", &self.listen)
            .field("secret_token", &self.secret_token.as_ref().map(|_| "<redacted>"))
            .field("allowed_updates", &self.allowed_updates)
            .field("delete_on_shutdown", &self.delete_on_shutdown)
            .finish_non_exhaustive()
    }
}

/// Receives updates over HTTP.
#[derive(Debug)]
pub struct WebhookSource {
    options: WebhookOptions,
}

impl WebhookSource {
    pub fn new(options: WebhookOptions) -> Self {
        Self { options }
    }

    fn set_webhook_params(&self) -> Params {
        let mut params = Params::new().with("url", self.options.url.as_str());
        if let Some(secret) = &self.options.secret_token {
            params.insert("secret_token", secret.as_str());
        }
        if let Some(kinds) = &self.options.allowed_updates {
            let kinds: Vec<Value> = kinds.iter().map(|k| Value::from(k.as_str())).collect();
            params.insert("allowed_updates", kinds);
        }
        params
    }
}

#[derive(Clone)]
struct WebhookState {
    sink: mpsc::Sender<Update>,
    secret: Option<Arc<str>>,
    cancel: CancellationToken,
}

/// Checks that `path` can be mounted as a single static route.
fn check_route(path: &str) -> SourceResult<()> {
    if !path.starts_with('/') {
        return Err(SourceError::InvalidRoute("must start with '/'".into()));
    }
    if path.contains(['{', '}']) || path.contains("/:") || path.contains("/*") {
        return Err(SourceError::InvalidRoute(
            "must not contain route parameters".into(),
        ));
    }
    Ok(())
}

fn router(path: &str, state: WebhookState) -> Router {
    Router::new()
        .route(path, post(receive_update))
        .with_state(state)
}

async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(secret) = &state.secret {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(secret.as_ref()) {
            warn!("Rejected webhook request with a bad secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(update)) => update,
        Ok(other) => {
            warn!(found = other.type_name(), "Webhook body is not an object");
            return StatusCode::BAD_REQUEST;
        }
        Err(e) => {
            warn!(error = %e, "Cannot decode webhook body");
            return StatusCode::BAD_REQUEST;
        }
    };

    trace!(update_id = ?update.get_i64("update_id").ok(), "Webhook update received");
    if deliver(&state.sink, update, &state.cancel).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[async_trait]
impl UpdateSource for WebhookSource {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn run(
        &mut self,
        bot: Bot,
        sink: mpsc::Sender<Update>,
        cancel: CancellationToken,
    ) -> SourceResult<()> {
        check_route(&self.options.path)?;

        let listener = TcpListener::bind(self.options.listen)
            .await
            .map_err(|e| SourceError::Bind {
                addr: self.options.listen.to_string(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().unwrap_or(self.options.listen);

        bot.set_webhook(self.set_webhook_params()).await?;
        info!(addr = %local_addr, "Webhook registered and listening");

        let state = WebhookState {
            sink,
            secret: self.options.secret_token.as_deref().map(Arc::from),
            cancel: cancel.clone(),
        };
        let served = axum::serve(listener, router(&self.options.path, state))
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await;

        if self.options.delete_on_shutdown {
            match bot.delete_webhook(Params::new()).await {
                Ok(_) => debug!("Webhook deleted"),
                Err(e) => warn!(error = %e, "Failed to delete webhook"),
            }
        }

        served.map_err(|e| SourceError::Server(e.to_string()))?;
        info!("Webhook server stopped");
        Ok(())
    }
}
