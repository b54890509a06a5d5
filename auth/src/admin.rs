//! Admin role derivation.
//!
//! The policy is injected at the composition root. An empty allow-list grants
//! admin to nobody.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Decides whether an email on record carries admin privileges.
#[derive(Clone)]
pub enum AdminPolicy {
    /// Exact match against a fixed set of emails.
    AllowList(HashSet<String>),
    /// Arbitrary check, e.g. a role lookup.
    Predicate(Predicate),
}

impl AdminPolicy {
    /// Policy that never grants admin.
    #[must_use]
    pub fn none() -> Self {
        Self::AllowList(HashSet::new())
    }

    #[must_use]
    pub fn allow_list<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllowList(emails.into_iter().map(Into::into).collect())
    }

    pub fn predicate(check: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(check))
    }

    /// Parse a comma-separated allow-list, ignoring blanks.
    #[must_use]
    pub fn from_csv(raw: &str) -> Self {
        Self::allow_list(
            raw.split(',')
                .map(str::trim)
                .filter(|email| !email.is_empty()),
        )
    }

    #[must_use]
    pub fn is_admin(&self, email: &str) -> bool {
        match self {
            Self::AllowList(emails) => emails.contains(email),
            Self::Predicate(check) => check(email),
        }
    }
}

impl Default for AdminPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for AdminPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllowList(emails) => f.debug_tuple("AllowList").field(&emails.len()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
