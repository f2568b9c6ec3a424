//! Updates and their classification.
//!
//! An [`Update`] is the raw object delivered by the remote API. Exactly one
//! of a fixed set of top-level keys identifies what it carries; [`classify`]
//! finds that key and splits the update into a [`ClassifiedUpdate`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;
use crate::value::{Object, Value};

/// A raw update as received from the remote API.
pub type Update = Object;

/// The closed set of update kinds.
///
/// The declaration order is the classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    InlineQuery,
    ChosenInlineResult,
    CallbackQuery,
    ShippingQuery,
    PreCheckoutQuery,
    Poll,
    PollAnswer,
    MyChatMember,
    ChatMember,
}

impl UpdateKind {
    /// Number of update kinds.
    pub const COUNT: usize = 13;

    /// Every kind, in classification priority order.
    pub const ALL: [UpdateKind; Self::COUNT] = [
        Self::Message,
        Self::EditedMessage,
        Self::ChannelPost,
        Self::EditedChannelPost,
        Self::InlineQuery,
        Self::ChosenInlineResult,
        Self::CallbackQuery,
        Self::ShippingQuery,
        Self::PreCheckoutQuery,
        Self::Poll,
        Self::PollAnswer,
        Self::MyChatMember,
        Self::ChatMember,
    ];

    /// The top-level update key for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::InlineQuery => "inline_query",
            Self::ChosenInlineResult => "chosen_inline_result",
            Self::CallbackQuery => "callback_query",
            Self::ShippingQuery => "shipping_query",
            Self::PreCheckoutQuery => "pre_checkout_query",
            Self::Poll => "poll",
            Self::PollAnswer => "poll_answer",
            Self::MyChatMember => "my_chat_member",
            Self::ChatMember => "chat_member",
        }
    }

    /// Position of this kind in [`UpdateKind::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Looks up a kind by its top-level key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == key)
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An update split into its kind and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedUpdate {
    /// The `update_id` field, when present and integral.
    pub update_id: Option<i64>,
    /// The recognized kind.
    pub kind: UpdateKind,
    /// The object stored under the kind's key.
    pub payload: Object,
}

/// Determines the kind of `update` and extracts its payload.
///
/// Keys are tested in [`UpdateKind::ALL`] order and the first present key
/// wins. The payload is moved out of the update unaltered.
pub fn classify(mut update: Update) -> Result<ClassifiedUpdate, ClassifyError> {
    let update_id = update.get("update_id").and_then(Value::as_i64);

    let found = UpdateKind::ALL
        .into_iter()
        .find_map(|kind| update.remove(kind.as_str()).map(|value| (kind, value)));

    match found {
        Some((kind, Value::Object(payload))) => Ok(ClassifiedUpdate {
            update_id,
            kind,
            payload,
        }),
        Some((kind, other)) => Err(ClassifyError::MalformedPayload {
            kind,
            found: other.type_name(),
        }),
        None => Err(ClassifyError::Unclassified {
            keys: update.keys().cloned().collect(),
        }),
    }
}
