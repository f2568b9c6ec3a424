//! HTTP client transport.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{ApiResult, Params, Transport, TransportError, TransportResult, Value};
use reqwest::Client;
use tracing::{debug, trace};

use super::envelope::decode_envelope;
use super::multipart::build_form;

/// The public Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Settings for [`HttpTransport`].
#[derive(Clone)]
pub struct HttpTransportConfig {
    /// Base URL without the `/bot<token>` suffix.
    pub api_url: String,
    pub token: String,
    /// Whole-request timeout; must exceed the long-poll timeout.
    pub timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for HttpTransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransportConfig")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Calls the remote API with `reqwest`.
///
/// Each method is a POST to `{api_url}/bot{token}/{method}`. The token is
/// part of every URL, so URLs are never logged and request errors are
/// stripped of them.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    /// `{api_url}/bot{token}`
    base: String,
    api_url: String,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> TransportResult<Self> {
        if config.token.is_empty() {
            return Err(TransportError::InvalidConfig("empty API token".into()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::InvalidConfig(e.without_url().to_string()))?;

        let api_url = config.api_url.trim_end_matches('/').to_string();
        let base = format!("{api_url}/bot{}", config.token);
        debug!(api_url = %api_url, timeout = ?config.timeout, "HTTP transport created");

        Ok(Self {
            client,
            base,
            api_url,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

fn request_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(err.without_url().to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, method: &str, params: Params) -> ApiResult<Value> {
        let (fields, files) = params.into_parts();
        let request = self.client.post(self.method_url(method));
        let request = if files.is_empty() {
            trace!(method, fields = fields.len(), "POST json");
            request.json(&fields)
        } else {
            trace!(method, fields = fields.len(), files = files.len(), "POST multipart");
            request.multipart(build_form(fields, files)?)
        };

        let response = request.send().await.map_err(request_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(request_error)?;
        trace!(method, status, len = body.len(), "API response");

        decode_envelope(status, &body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
