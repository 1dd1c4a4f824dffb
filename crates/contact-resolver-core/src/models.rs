//! Core data models used throughout Contact Resolver.
//!
//! These types represent the stored contact records and the validated
//! identity fragments that flow into the resolver.

use std::fmt;
use std::str::FromStr;

use crate::error::ResolveError;

/// Whether a contact is the canonical record of its identity or merged into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkPrecedence {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(LinkPrecedence::Primary),
            "secondary" => Ok(LinkPrecedence::Secondary),
            other => anyhow::bail!("invalid link precedence: '{}'", other),
        }
    }
}

/// A stored contact record.
///
/// Timestamps are unix milliseconds (UTC), assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: i64,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Set only on secondaries; always refers to a primary.
    pub linked_id: Option<i64>,
    pub link_precedence: LinkPrecedence,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl Contact {
    pub fn is_primary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Primary
    }

    /// Ordering key shared by every "oldest first" decision.
    pub fn age_key(&self) -> (i64, i64) {
        (self.created_at, self.id)
    }
}

/// Fields for a contact that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewContact<'a> {
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub linked_id: Option<i64>,
    pub link_precedence: LinkPrecedence,
}

/// A validated incoming identity fragment.
///
/// Empty strings are treated as absent; at least one field is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFragment {
    email: Option<String>,
    phone: Option<String>,
}

impl IdentityFragment {
    pub fn new(email: Option<String>, phone: Option<String>) -> Result<Self, ResolveError> {
        let email = email.filter(|e| !e.is_empty());
        let phone = phone.filter(|p| !p.is_empty());
        if email.is_none() && phone.is_none() {
            return Err(ResolveError::Validation(
                "Either email or phoneNumber must be provided".to_string(),
            ));
        }
        Ok(Self { email, phone })
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }
}

/// Sorts contacts oldest first by `(created_at, id)`.
pub fn sort_by_age(contacts: &mut [Contact]) {
    contacts.sort_by_key(Contact::age_key);
}
