//! The bot handle.
//!
//! [`Bot`] is what matchers and handlers hold on to: a cheap-clone handle
//! over the [`Transport`] plus the bot's own identity, fetched once at
//! startup. It also carries a typed wrapper for every remote method the
//! framework knows about.
//!
//! # Example
//!
//! ```rust,ignore
//! let me = bot.fetch_identity().await?;
//! bot.send_message(Params::new().with("chat_id", chat_id).with("text", "hi")).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::error::{ApiError, ApiResult};
use crate::params::Params;
use crate::transport::BoxedTransport;
use crate::types::User;
use crate::value::{Object, Value};

// =============================================================================
// Result Conversion
// =============================================================================

/// Converts the `result` of an API envelope into a typed value.
pub trait FromApiValue: Sized {
    /// Shape name reported in [`ApiError::UnexpectedResult`].
    const EXPECTED: &'static str;

    /// Returns `None` when `value` has the wrong shape.
    fn from_api_value(value: Value) -> Option<Self>;
}

impl FromApiValue for Value {
    const EXPECTED: &'static str = "any value";

    fn from_api_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromApiValue for Object {
    const EXPECTED: &'static str = "object";

    fn from_api_value(value: Value) -> Option<Self> {
        value.into_object().ok()
    }
}

impl FromApiValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_api_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromApiValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_api_value(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromApiValue for Vec<Value> {
    const EXPECTED: &'static str = "array";

    fn from_api_value(value: Value) -> Option<Self> {
        value.into_array().ok()
    }
}

impl FromApiValue for User {
    const EXPECTED: &'static str = "user object";

    fn from_api_value(value: Value) -> Option<Self> {
        serde_json::from_value(serde_json::Value::from(value)).ok()
    }
}

// =============================================================================
// Bot
// =============================================================================

struct BotInner {
    transport: BoxedTransport,
    identity: OnceCell<User>,
}

/// Handle to one bot account.
///
/// Cloning is cheap. The identity slot is filled at most once; after that it
/// is read without synchronization by every matcher that needs it.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

impl Bot {
    /// Creates a bot whose identity has not been fetched yet.
    pub fn new(transport: BoxedTransport) -> Self {
        Self {
            inner: Arc::new(BotInner {
                transport,
                identity: OnceCell::new(),
            }),
        }
    }

    /// Creates a bot with a known identity; `getMe` will not be called.
    pub fn with_identity(transport: BoxedTransport, user: User) -> Self {
        Self {
            inner: Arc::new(BotInner {
                transport,
                identity: OnceCell::new_with(Some(user)),
            }),
        }
    }

    pub fn transport(&self) -> &BoxedTransport {
        &self.inner.transport
    }

    /// Invokes `method` and returns the raw result.
    pub async fn call(&self, method: &str, params: Params) -> ApiResult<Value> {
        trace!(
            method,
            fields = params.fields().len(),
            files = params.files().len(),
            "Invoking API method"
        );
        self.inner.transport.invoke(method, params).await
    }

    /// Invokes `method` and converts the result.
    pub async fn call_as<T: FromApiValue>(&self, method: &str, params: Params) -> ApiResult<T> {
        let value = self.call(method, params).await?;
        T::from_api_value(value).ok_or_else(|| ApiError::UnexpectedResult {
            method: method.to_string(),
            expected: T::EXPECTED,
        })
    }

    /// Returns the bot's identity, calling `getMe` on first use only.
    ///
    /// Concurrent first calls share a single request.
    pub async fn fetch_identity(&self) -> ApiResult<&User> {
        self.inner
            .identity
            .get_or_try_init(|| async {
                let user = self.get_me().await?;
                debug!(id = user.id, username = ?user.username, "Fetched bot identity");
                Ok(user)
            })
            .await
    }

    /// The cached identity, if it has been fetched.
    pub fn identity(&self) -> Option<&User> {
        self.inner.identity.get()
    }

    /// The cached username, if known.
    pub fn username(&self) -> Option<&str> {
        self.identity().and_then(|user| user.username.as_deref())
    }

    /// Sends a plain text message to `chat_id`.
    pub async fn send_text(&self, chat_id: i64, text: impl Into<String>) -> ApiResult<Object> {
        self.send_message(Params::new().with("chat_id", chat_id).with("text", text.into()))
            .await
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("transport", &self.inner.transport.name())
            .field("identity", &self.identity().map(|user| user.id))
            .finish()
    }
}

// =============================================================================
// API Wrappers
// =============================================================================

/// Generates a typed wrapper around [`Bot::call_as`].
///
/// `name => "remoteMethod" -> Ret` takes a [`Params`];
/// `name => "remoteMethod" () -> Ret` takes nothing.
macro_rules! impl_api {
    ($(#[$meta:meta])* $name:ident => $method:literal () -> $ret:ty $(,)?) => {
        $(#[$meta])*
        pub async fn $name(&self) -> ApiResult<$ret> {
            self.call_as($method, Params::new()).await
        }
    };
    ($(#[$meta:meta])* $name:ident => $method:literal -> $ret:ty $(,)?) => {
        $(#[$meta])*
        pub async fn $name(&self, params: Params) -> ApiResult<$ret> {
            self.call_as($method, params).await
        }
    };
}

impl Bot {
    impl_api!(
        /// Returns the bot's own user record. Prefer [`Bot::fetch_identity`].
        get_me => "getMe" () -> User
    );
    impl_api!(log_out => "logOut" () -> bool);
    impl_api!(close => "close" () -> bool);
    impl_api!(
        /// Fetches pending updates (`offset`, `limit`, `timeout`, `allowed_updates`).
        get_updates => "getUpdates" -> Vec<Value>
    );

    // Messages

    impl_api!(send_message => "sendMessage" -> Object);
    impl_api!(forward_message => "forwardMessage" -> Object);
    impl_api!(
        /// Copies a message; the result holds only the new `message_id`.
        copy_message => "copyMessage" -> Object
    );
    impl_api!(send_photo => "sendPhoto" -> Object);
    impl_api!(send_audio => "sendAudio" -> Object);
    impl_api!(send_document => "sendDocument" -> Object);
    impl_api!(send_video => "sendVideo" -> Object);
    impl_api!(send_animation => "sendAnimation" -> Object);
    impl_api!(send_voice => "sendVoice" -> Object);
    impl_api!(send_video_note => "sendVideoNote" -> Object);
    impl_api!(send_media_group => "sendMediaGroup" -> Vec<Value>);
    impl_api!(send_location => "sendLocation" -> Object);
    impl_api!(
        /// Returns the edited message, or `true` for inline messages.
        edit_message_live_location => "editMessageLiveLocation" -> Value
    );
    impl_api!(
        /// Returns the edited message, or `true` for inline messages.
        stop_message_live_location => "stopMessageLiveLocation" -> Value
    );
    impl_api!(send_venue => "sendVenue" -> Object);
    impl_api!(send_contact => "sendContact" -> Object);
    impl_api!(send_poll => "sendPoll" -> Object);
    impl_api!(send_dice => "sendDice" -> Object);
    impl_api!(send_chat_action => "sendChatAction" -> bool);
    impl_api!(
        /// Returns the edited message, or `true` for inline messages.
        edit_message_text => "editMessageText" -> Value
    );
    impl_api!(delete_message => "deleteMessage" -> bool);

    // Users and files

    impl_api!(get_user_profile_photos => "getUserProfilePhotos" -> Object);
    impl_api!(get_file => "getFile" -> Object);

    // Chat administration

    impl_api!(ban_chat_member => "banChatMember" -> bool);
    impl_api!(
        /// Older name of `banChatMember`, still accepted by the API.
        kick_chat_member => "kickChatMember" -> bool
    );
    impl_api!(unban_chat_member => "unbanChatMember" -> bool);
    impl_api!(restrict_chat_member => "restrictChatMember" -> bool);
    impl_api!(promote_chat_member => "promoteChatMember" -> bool);
    impl_api!(pin_chat_message => "pinChatMessage" -> bool);
    impl_api!(unpin_chat_message => "unpinChatMessage" -> bool);
    impl_api!(unpin_all_chat_messages => "unpinAllChatMessages" -> bool);
    impl_api!(leave_chat => "leaveChat" -> bool);
    impl_api!(get_chat => "getChat" -> Object);
    impl_api!(get_chat_administrators => "getChatAdministrators" -> Vec<Value>);
    impl_api!(get_chat_member_count => "getChatMemberCount" -> i64);
    impl_api!(get_chat_member => "getChatMember" -> Object);
    impl_api!(set_chat_sticker_set => "setChatStickerSet" -> bool);
    impl_api!(delete_chat_sticker_set => "deleteChatStickerSet" -> bool);

    // Callbacks and commands

    impl_api!(answer_callback_query => "answerCallbackQuery" -> bool);
    impl_api!(set_my_commands => "setMyCommands" -> bool);
    impl_api!(get_my_commands => "getMyCommands" () -> Vec<Value>);

    // Webhooks

    impl_api!(set_webhook => "setWebhook" -> bool);
    impl_api!(delete_webhook => "deleteWebhook" -> bool);
    impl_api!(get_webhook_info => "getWebhookInfo" () -> Object);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fetch_identity_calls_get_me_once() {
        let mock = Arc::new(
            MockTransport::new()
                .with_bot_user(7, "courier_bot")
                .with_latency(Duration::from_millis(20)),
        );
        let bot = Bot::new(mock.clone());
        assert!(bot.identity().is_none());

        let (a, b) = tokio::join!(bot.fetch_identity(), bot.fetch_identity());
        assert_eq!(a.unwrap().id, 7);
        assert_eq!(b.unwrap().id, 7);
        tokio_test::assert_ok!(bot.fetch_identity().await);

        assert_eq!(mock.call_count("getMe"), 1);
        assert_eq!(bot.username(), Some("courier_bot"));
    }

    #[tokio::test]
    async fn test_fetch_identity_error_is_returned() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(
            "getMe",
            Err(ApiError::Api {
                code: 401,
                description: "Unauthorized".into(),
                retry_after: None,
            }),
        );
        let bot = Bot::new(mock.clone());

        let err = tokio_test::assert_err!(bot.fetch_identity().await);
        assert!(matches!(err, ApiError::Api { code: 401, .. }));
        assert!(bot.identity().is_none());
    }

    #[tokio::test]
    async fn test_wrappers_use_remote_method_names() {
        let mock = Arc::new(MockTransport::new());
        mock.set_response("sendMessage", Ok(Object::new().with("message_id", 5).into()));
        let bot = Bot::new(mock.clone());

        let sent = bot.send_text(42, "hello").await.unwrap();
        assert_eq!(sent.get_i64("message_id").unwrap(), 5);
        assert!(bot.ban_chat_member(Params::new().with("chat_id", 1)).await.unwrap());
        assert!(bot.delete_webhook(Params::new()).await.unwrap());

        let calls = mock.calls_to("sendMessage");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get("chat_id"), Some(&Value::Int(42)));
        assert_eq!(mock.call_count("banChatMember"), 1);
        assert_eq!(mock.call_count("deleteWebhook"), 1);
    }

    #[tokio::test]
    async fn test_wrong_result_shape_is_an_error() {
        let mock = Arc::new(MockTransport::new());
        mock.set_response("getChatMemberCount", Ok(Value::from("many")));
        let bot = Bot::new(mock);

        let err = bot
            .get_chat_member_count(Params::new().with("chat_id", 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::UnexpectedResult { ref method, expected: "integer" }
                if method == "getChatMemberCount"
        ));
    }

    #[tokio::test]
    async fn test_preset_identity_skips_get_me() {
        let mock = Arc::new(MockTransport::new());
        let user = User {
            id: 1,
            is_bot: true,
            first_name: "Preset".into(),
            last_name: None,
            username: Some("preset_bot".into()),
            language_code: None,
            can_join_groups: false,
            can_read_all_group_messages: false,
            supports_inline_queries: false,
        };
        let bot = Bot::with_identity(mock.clone(), user);
        assert_eq!(bot.fetch_identity().await.unwrap().id, 1);
        assert_eq!(mock.call_count("getMe"), 0);
    }
}
