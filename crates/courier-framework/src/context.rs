//! Per-update context handed to matchers and handlers.
//!
//! One [`Context`] is built for every classified update and shared (behind an
//! `Arc`) by every handler in the chain. It is read-only: handlers signal
//! their outcome through their return value, not by mutating the context.

use std::fmt;

use courier_core::{ApiError, ApiResult, Bot, ClassifiedUpdate, Object, UpdateKind};
use tokio_util::sync::CancellationToken;

/// Everything a matcher or handler can see about one update.
pub struct Context {
    bot: Bot,
    kind: UpdateKind,
    update_id: Option<i64>,
    payload: Object,
    cancel: CancellationToken,
}

impl Context {
    /// Creates a context for a classified update.
    pub fn new(bot: Bot, update: ClassifiedUpdate, cancel: CancellationToken) -> Self {
        Self {
            bot,
            kind: update.kind,
            update_id: update.update_id,
            payload: update.payload,
            cancel,
        }
    }

    /// The bot handle, for calling the remote API.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn kind(&self) -> UpdateKind {
        self.kind
    }

    pub fn update_id(&self) -> Option<i64> {
        self.update_id
    }

    /// The object stored under the update's kind key.
    pub fn payload(&self) -> &Object {
        &self.payload
    }

    /// Fires when the runtime is shutting down.
    ///
    /// Running handlers are never aborted; long-running ones may watch this
    /// token to finish early.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // =========================================================================
    // Payload shortcuts
    // =========================================================================

    /// The `text` field of a message-like payload.
    pub fn text(&self) -> Option<&str> {
        self.payload.get_str("text").ok()
    }

    /// The chat the update belongs to.
    ///
    /// Callback queries carry it on the originating message.
    pub fn chat(&self) -> Option<&Object> {
        match self.kind {
            UpdateKind::CallbackQuery => self.payload.get_object("message.chat").ok(),
            _ => self.payload.get_object("chat").ok(),
        }
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.chat().and_then(|chat| chat.get_i64("id").ok())
    }

    pub fn chat_type(&self) -> Option<&str> {
        self.chat().and_then(|chat| chat.get_str("type").ok())
    }

    /// The `from.id` of the payload.
    pub fn sender_id(&self) -> Option<i64> {
        self.payload.get_i64("from.id").ok()
    }

    /// Sends `text` to the update's chat.
    pub async fn reply_text(&self, text: impl Into<String>) -> ApiResult<Object> {
        let chat_id = self.chat_id().ok_or_else(|| {
            ApiError::Other(format!("{} update has no chat to reply to", self.kind))
        })?;
        self.bot.send_text(chat_id, text).await
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("kind", &self.kind)
            .field("update_id", &self.update_id)
            .field("bot", &self.bot)
            .finish_non_exhaustive()
    }
}
