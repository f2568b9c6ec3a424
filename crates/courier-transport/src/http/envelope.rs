//! The API response envelope.

use courier_core::{ApiError, ApiResult, Value};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
    #[serde(default)]
    migrate_to_chat_id: Option<i64>,
}

/// Decodes an API response body.
///
/// `ok: true` yields `result` (`Null` when absent). `ok: false` becomes
/// [`ApiError::Api`], with the HTTP status standing in for a missing
/// `error_code`. A body that is not an envelope is
/// [`ApiError::InvalidResponse`].
pub fn decode_envelope(status: u16, body: &[u8]) -> ApiResult<Value> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| {
        ApiError::InvalidResponse(format!("HTTP {status}: {e}"))
    })?;

    if envelope.ok {
        return Ok(envelope.result);
    }

    let parameters = envelope.parameters.unwrap_or_default();
    let mut description = envelope
        .description
        .unwrap_or_else(|| "no description".to_string());
    if let Some(chat_id) = parameters.migrate_to_chat_id {
        description.push_str(&format!(" (migrated to chat {chat_id})"));
    }

    Err(ApiError::Api {
        code: envelope.error_code.unwrap_or(i64::from(status)),
        description,
        retry_after: parameters.retry_after,
    })
}
