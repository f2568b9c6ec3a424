//! Test doubles.
//!
//! Available in this crate's tests and, with the `test-util` feature, to
//! downstream crates.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ApiResult;
use crate::params::Params;
use crate::transport::Transport;
use crate::value::{Object, Value};

/// One recorded [`Transport::invoke`] call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub params: Params,
}

/// An in-memory [`Transport`] with scripted responses.
///
/// For each method, queued responses (`push_response`) are returned first,
/// then the standing response (`set_response`), then `Ok(true)`.
#[derive(Debug, Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<ApiResult<Value>>>>,
    standing: Mutex<HashMap<String, ApiResult<Value>>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answers `getMe` with a bot account.
    pub fn with_bot_user(self, id: i64, username: &str) -> Self {
        let user = Object::new()
            .with("id", id)
            .with("is_bot", true)
            .with("first_name", username)
            .with("username", username);
        self.set_response("getMe", Ok(user.into()));
        self
    }

    /// Queues a one-shot response for `method`.
    pub fn push_response(&self, method: &str, response: ApiResult<Value>) {
        self.queued
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    /// Sets the response returned whenever the queue for `method` is empty.
    pub fn set_response(&self, method: &str, response: ApiResult<Value>) {
        self.standing.lock().insert(method.to_string(), response);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// The parameters of every call to `method`, in order.
    pub fn calls_to(&self, method: &str) -> Vec<Params> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .map(|call| call.params.clone())
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    fn next_response(&self, method: &str) -> ApiResult<Value> {
        if let Some(response) = self
            .queued
            .lock()
            .get_mut(method)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        self.standing
            .lock()
            .get(method)
            .cloned()
            .unwrap_or(Ok(Value::Bool(true)))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn invoke(&self, method: &str, params: Params) -> ApiResult<Value> {
        self.calls.lock().push(RecordedCall {
            method: method.to_string(),
            params,
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.next_response(method)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[tokio::test]
    async fn test_queued_then_standing_then_default() {
        let mock = MockTransport::new();
        mock.push_response("getChat", Ok(Value::from("first")));
        mock.push_response("getChat", Err(ApiError::Other("boom".into())));
        mock.set_response("getChat", Ok(Value::from("standing")));

        assert_eq!(mock.invoke("getChat", Params::new()).await.unwrap(), Value::from("first"));
        assert!(mock.invoke("getChat", Params::new()).await.is_err());
        assert_eq!(mock.invoke("getChat", Params::new()).await.unwrap(), Value::from("standing"));
        assert_eq!(mock.invoke("leaveChat", Params::new()).await.unwrap(), Value::Bool(true));

        assert_eq!(mock.call_count("getChat"), 3);
        assert_eq!(mock.calls().len(), 4);
        assert_eq!(mock.calls()[3].method, "leaveChat");
    }
}
