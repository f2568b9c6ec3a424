//! Matchers decide whether a handler runs for an update.
//!
//! A [`Matcher`] wraps a pure predicate over the [`Context`]. Predicates must
//! not fail: a missing or mistyped payload field simply means "no match".
//! Matchers compose with [`Matcher::and`], [`Matcher::or`] and `!`:
//!
//! ```rust,ignore
//! use courier_framework::matchers::{has_command, in_group, is_from};
//!
//! let admin_ban = has_command("/ban").and(in_group()).and(is_from(ADMIN_ID));
//! let everyone_else = !is_from(ADMIN_ID);
//! ```

use std::fmt;
use std::ops::Not;
use std::sync::Arc;

use crate::context::Context;

/// A type-erased predicate.
pub type CheckFn = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// A cheap-clone predicate over an update's context.
#[derive(Clone)]
pub struct Matcher {
    check: CheckFn,
    name: Option<Arc<str>>,
}

impl Matcher {
    /// Wraps a predicate.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(f),
            name: None,
        }
    }

    /// Sets a name shown in logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(Arc::from(name.into()));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name.map(Arc::from);
        self
    }

    /// Evaluates the predicate.
    pub fn matches(&self, ctx: &Context) -> bool {
        (self.check)(ctx)
    }

    /// Matches when both `self` and `other` match; `other` is not evaluated
    /// if `self` fails.
    pub fn and(self, other: Matcher) -> Matcher {
        let name = joined_name([&self, &other], " & ");
        Matcher::new(move |ctx| self.matches(ctx) && other.matches(ctx)).with_name(name)
    }

    /// Matches when either matches; `other` is not evaluated if `self` matches.
    pub fn or(self, other: Matcher) -> Matcher {
        let name = joined_name([&self, &other], " | ");
        Matcher::new(move |ctx| self.matches(ctx) || other.matches(ctx)).with_name(name)
    }
}

/// Joins the names of `matchers` with `op`, wrapped in parentheses.
///
/// `None` if the list is empty or any matcher is unnamed.
pub(crate) fn joined_name<'a>(
    matchers: impl IntoIterator<Item = &'a Matcher>,
    op: &str,
) -> Option<String> {
    let names: Option<Vec<&str>> = matchers.into_iter().map(Matcher::name).collect();
    names
        .filter(|names| !names.is_empty())
        .map(|names| format!("({})", names.join(op)))
}

impl Not for Matcher {
    type Output = Matcher;

    fn not(self) -> Self::Output {
        let name = self.name().map(|name| format!("!{name}"));
        Matcher::new(move |ctx| !self.matches(ctx)).with_name(name)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("name", &self.name.as_deref().unwrap_or("unnamed"))
            .finish()
    }
}
