//! Ready-made matchers.
//!
//! All of these read the update payload through the fallible accessors of
//! [`Object`](courier_core::Object) and turn any shape mismatch into `false`.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_framework::matchers::{has_command, is_private};
//!
//! let dispatcher = Dispatcher::builder()
//!     .on_message(has_command("/start").and(is_private()), start_handler)
//!     .build();
//! ```

use courier_core::Value;

use crate::context::Context;
use crate::matcher::{Matcher, joined_name};

/// Matches every update.
pub fn always() -> Matcher {
    Matcher::new(|_| true).named("always")
}

/// Matches no update.
pub fn never() -> Matcher {
    Matcher::new(|_| false).named("never")
}

/// Matches when every matcher matches. An empty list matches.
pub fn and(matchers: impl IntoIterator<Item = Matcher>) -> Matcher {
    let matchers: Vec<Matcher> = matchers.into_iter().collect();
    let name = joined_name(&matchers, " & ");
    let matcher = Matcher::new(move |ctx| matchers.iter().all(|m| m.matches(ctx)));
    match name {
        Some(name) => matcher.named(name),
        None => matcher,
    }
}

/// Matches when any matcher matches. An empty list never matches.
pub fn or(matchers: impl IntoIterator<Item = Matcher>) -> Matcher {
    let matchers: Vec<Matcher> = matchers.into_iter().collect();
    let name = joined_name(&matchers, " | ");
    let matcher = Matcher::new(move |ctx| matchers.iter().any(|m| m.matches(ctx)));
    match name {
        Some(name) => matcher.named(name),
        None => matcher,
    }
}

/// Inverts a matcher.
pub fn not(matcher: Matcher) -> Matcher {
    !matcher
}

/// Matches updates whose chat has the given `type`
/// (`private`, `group`, `supergroup` or `channel`).
pub fn chat_type(kind: impl Into<String>) -> Matcher {
    let kind = kind.into();
    let name = format!("chat_type:{kind}");
    Matcher::new(move |ctx| ctx.chat_type() == Some(kind.as_str())).named(name)
}

/// Matches private chats.
pub fn is_private() -> Matcher {
    chat_type("private")
}

/// Matches groups and supergroups.
pub fn in_group() -> Matcher {
    Matcher::new(|ctx| is_group(ctx.chat_type())).named("in_group")
}

/// Matches updates sent by `user_id`.
pub fn is_from(user_id: i64) -> Matcher {
    Matcher::new(move |ctx| ctx.sender_id() == Some(user_id)).named(format!("is_from:{user_id}"))
}

/// Matches payloads with a string `text` field.
pub fn has_text() -> Matcher {
    Matcher::new(|ctx| ctx.text().is_some()).named("has_text")
}

/// Matches payloads with a `photo` array.
pub fn has_photo() -> Matcher {
    Matcher::new(|ctx| ctx.payload().get_array("photo").is_ok()).named("has_photo")
}

/// Matches payloads with an `entities` array.
pub fn has_entities() -> Matcher {
    Matcher::new(|ctx| ctx.payload().get_array("entities").is_ok()).named("has_entities")
}

/// Matches callback queries whose `data` starts with `prefix`.
pub fn callback_data(prefix: impl Into<String>) -> Matcher {
    let prefix = prefix.into();
    let name = format!("callback_data:{prefix}");
    Matcher::new(move |ctx| {
        ctx.payload()
            .get_str("data")
            .is_ok_and(|data| data.starts_with(prefix.as_str()))
    })
    .named(name)
}

/// Matches messages carrying the bot command `command` (e.g. `"/start"`).
///
/// Entity offsets and lengths count UTF-16 code units. In private chats the
/// entity text must equal `command`; in groups it must be
/// `command@<bot username>`, with the username compared case-insensitively.
/// Without a cached bot identity, group commands never match.
pub fn has_command(command: impl Into<String>) -> Matcher {
    let command = command.into();
    let name = format!("command:{command}");
    Matcher::new(move |ctx| command_matches(ctx, &command)).named(name)
}

fn is_group(chat_type: Option<&str>) -> bool {
    matches!(chat_type, Some("group" | "supergroup"))
}

fn command_matches(ctx: &Context, command: &str) -> bool {
    let payload = ctx.payload();
    let (Ok(text), Ok(entities), Ok(chat_type)) = (
        payload.get_str("text"),
        payload.get_array("entities"),
        payload.get_str("chat.type"),
    ) else {
        return false;
    };

    let username = if is_group(Some(chat_type)) {
        match ctx.bot().username() {
            Some(username) => Some(username),
            None => return false,
        }
    } else {
        None
    };

    entities.iter().filter_map(Value::as_object).any(|entity| {
        if entity
            .get_str("type")
            .is_ok_and(|kind| kind != "bot_command")
        {
            return false;
        }
        let (Ok(offset), Ok(length)) = (entity.get_i64("offset"), entity.get_i64("length")) else {
            return false;
        };
        let Some(found) = utf16_slice(text, offset, length) else {
            return false;
        };
        match username {
            Some(username) => found.split_once('@').is_some_and(|(cmd, target)| {
                cmd == command && target.eq_ignore_ascii_case(username)
            }),
            None => found == command,
        }
    })
}

/// Returns the part of `text` spanning UTF-16 code units
/// `offset..offset + length`.
///
/// `None` when the range is negative, runs past the end of `text`, or
/// starts or ends inside a surrogate pair.
pub fn utf16_slice(text: &str, offset: i64, length: i64) -> Option<&str> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(length).ok()?)?;

    let mut start_byte = None;
    let mut units = 0;
    for (byte, ch) in text.char_indices() {
        if units == start {
            start_byte = Some(byte);
        }
        if units == end {
            return Some(&text[start_byte?..byte]);
        }
        units += ch.len_utf16();
    }
    if units == start {
        start_byte = Some(text.len());
    }
    if units == end {
        return Some(&text[start_byte?..]);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::testing::MockTransport;
    use courier_core::{Bot, classify};
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn ctx_with(bot: Bot, update: serde_json::Value) -> Context {
        let update = classify(Value::from(update).into_object().unwrap()).unwrap();
        Context::new(bot, update, CancellationToken::new())
    }

    fn anonymous_bot() -> Bot {
        Bot::new(Arc::new(MockTransport::new()))
    }

    async fn named_bot(username: &str) -> Bot {
        let bot = Bot::new(Arc::new(MockTransport::new().with_bot_user(1, username)));
        bot.fetch_identity().await.unwrap();
        bot
    }

    fn command_update(text: &str, chat_type: &str, offset: i64, length: i64) -> serde_json::Value {
        json!({"message": {
            "text": text,
            "chat": {"id": 1, "type": chat_type},
            "entities": [{"type": "bot_command", "offset": offset, "length": length}]
        }})
    }

    #[test]
    fn test_utf16_slice_boundaries() {
        assert_eq!(utf16_slice("/start", 0, 6), Some("/start"));
        assert_eq!(utf16_slice("/start", 0, 7), None);
        assert_eq!(utf16_slice("/start", -1, 2), None);
        assert_eq!(utf16_slice("/start", 6, 0), Some(""));
        // 👋 is two UTF-16 units and four bytes
        assert_eq!(utf16_slice("👋 /go", 3, 3), Some("/go"));
        assert_eq!(utf16_slice("👋 /go", 1, 2), None);
        assert_eq!(utf16_slice("👋", 0, 1), None);
        assert_eq!(utf16_slice("é/x", 1, 2), Some("/x"));
    }

    #[test]
    fn test_command_in_private_chat() {
        let matcher = has_command("/start");
        let ctx = ctx_with(anonymous_bot(), command_update("/start", "private", 0, 6));
        assert!(matcher.matches(&ctx));

        let ctx = ctx_with(anonymous_bot(), command_update("/starting", "private", 0, 9));
        assert!(!matcher.matches(&ctx));

        let ctx = ctx_with(anonymous_bot(), command_update("/start", "private", 0, 60));
        assert!(!matcher.matches(&ctx));
    }

    #[test]
    fn test_command_after_astral_character() {
        let ctx = ctx_with(anonymous_bot(), command_update("👋 /start", "private", 3, 6));
        assert!(has_command("/start").matches(&ctx));
    }

    #[tokio::test]
    async fn test_group_command_needs_bot_username() {
        let bot = named_bot("Courier_Bot").await;
        let matcher = has_command("/start");

        let ctx = ctx_with(bot.clone(), command_update("/start@courier_bot", "group", 0, 18));
        assert!(matcher.matches(&ctx));

        let ctx = ctx_with(bot.clone(), command_update("/start@other_bot", "supergroup", 0, 16));
        assert!(!matcher.matches(&ctx));

        let ctx = ctx_with(bot, command_update("/start", "group", 0, 6));
        assert!(!matcher.matches(&ctx));

        let ctx = ctx_with(anonymous_bot(), command_update("/start@courier_bot", "group", 0, 18));
        assert!(!matcher.matches(&ctx));
    }

    #[test]
    fn test_non_command_entities_are_ignored() {
        let update = json!({"message": {
            "text": "/start",
            "chat": {"type": "private"},
            "entities": [{"type": "code", "offset": 0, "length": 6}]
        }});
        assert!(!has_command("/start").matches(&ctx_with(anonymous_bot(), update)));

        // entities without a type are still considered
        let update = json!({"message": {
            "text": "/start",
            "chat": {"type": "private"},
            "entities": [{"offset": 0, "length": 6}]
        }});
        assert!(has_command("/start").matches(&ctx_with(anonymous_bot(), update)));
    }

    #[test]
    fn test_malformed_payloads_do_not_match() {
        let update = json!({"message": {
            "text": "/start",
            "entities": "nope",
            "chat": {"type": "private"}
        }});
        assert!(!has_command("/start").matches(&ctx_with(anonymous_bot(), update)));

        let update = json!({"message": {"text": 5}});
        let ctx = ctx_with(anonymous_bot(), update);
        assert!(!has_text().matches(&ctx));
        assert!(!is_private().matches(&ctx));
        assert!(!is_from(1).matches(&ctx));
        assert!(!has_command("/start").matches(&ctx));
    }

    #[test]
    fn test_chat_and_sender_matchers() {
        let update = json!({"message": {
            "text": "hi",
            "from": {"id": 77},
            "chat": {"id": -5, "type": "supergroup"},
            "photo": [{"file_id": "a"}]
        }});
        let ctx = ctx_with(anonymous_bot(), update);

        assert!(in_group().matches(&ctx));
        assert!(!is_private().matches(&ctx));
        assert!(chat_type("supergroup").matches(&ctx));
        assert!(is_from(77).matches(&ctx));
        assert!(has_text().matches(&ctx));
        assert!(has_photo().matches(&ctx));
        assert!(!has_entities().matches(&ctx));
        assert!(and([in_group(), is_from(77)]).matches(&ctx));
        assert!(!and([in_group(), is_from(78)]).matches(&ctx));
        assert!(or([never(), has_text()]).matches(&ctx));
        assert!(!or(Vec::new()).matches(&ctx));
        assert!(not(never()).matches(&ctx));
        assert!(always().matches(&ctx));
    }

    #[test]
    fn test_callback_data_prefix() {
        let update = json!({"callback_query": {"id": "1", "data": "vote:yes"}});
        let ctx = ctx_with(anonymous_bot(), update);
        assert!(callback_data("vote:").matches(&ctx));
        assert!(!callback_data("poll:").matches(&ctx));
    }

    #[test]
    fn test_list_combinators_are_named() {
        assert_eq!(
            and([is_private(), has_text()]).name(),
            Some("(chat_type:private & has_text)")
        );
        assert_eq!(
            or([in_group(), not(has_photo())]).name(),
            Some("(in_group | !has_photo)")
        );
        assert_eq!(and(Vec::new()).name(), None);
        assert_eq!(or([has_text(), Matcher::new(|_| true)]).name(), None);
    }
}
