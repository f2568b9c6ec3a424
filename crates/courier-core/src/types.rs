//! Typed records returned by the remote API.
//!
//! Most results stay dynamic ([`Object`](crate::Object)); only the records
//! the framework itself reads are modelled here.

use serde::{Deserialize, Serialize};

/// A user or bot account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    /// Only returned by `getMe`.
    #[serde(default)]
    pub can_join_groups: bool,
    /// Only returned by `getMe`.
    #[serde(default)]
    pub can_read_all_group_messages: bool,
    /// Only returned by `getMe`.
    #[serde(default)]
    pub supports_inline_queries: bool,
}

impl User {
    /// Returns `@username` when set, the first name otherwise.
    pub fn mention(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None => self.first_name.clone(),
        }
    }
}
