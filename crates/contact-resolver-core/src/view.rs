//! Consolidated identity views.
//!
//! A [`ConsolidatedView`] is a pure projection of a resolved component: the
//! primary id, every distinct email and phone number (primary's first, then
//! oldest record first), and the ids of all secondaries.

use serde::{Serialize, Serializer};
use std::collections::HashSet;

use crate::error::{ResolveError, Result};
use crate::models::Contact;

/// Insertion-ordered set: the first occurrence of a value fixes its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` unless already present. Returns whether it was added.
    pub fn insert(&mut self, value: &str) -> bool {
        if self.seen.contains(value) {
            return false;
        }
        self.seen.insert(value.to_string());
        self.items.push(value.to_string());
        true
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Serialize for OrderedSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

/// The externally visible summary of one identity.
///
/// Serializes to the `/identify` response shape; note the
/// `primaryContatctId` spelling, which clients depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidatedView {
    #[serde(rename = "primaryContatctId")]
    pub primary_contact_id: i64,
    pub emails: OrderedSet,
    #[serde(rename = "phoneNumbers")]
    pub phone_numbers: OrderedSet,
    #[serde(rename = "secondaryContactIds")]
    pub secondary_contact_ids: Vec<i64>,
}

/// Response envelope: `{"contact": { ... }}`.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyResponse {
    pub contact: ConsolidatedView,
}

impl From<ConsolidatedView> for IdentifyResponse {
    fn from(contact: ConsolidatedView) -> Self {
        Self { contact }
    }
}

impl ConsolidatedView {
    /// Project a component snapshot into a view.
    ///
    /// The snapshot does not need to be sorted. If more than one primary is
    /// present the oldest is reported; a snapshot with none is rejected.
    pub fn build(component: &[Contact]) -> Result<Self> {
        let mut ordered: Vec<&Contact> = component.iter().collect();
        ordered.sort_by_key(|c| c.age_key());

        let primary = ordered
            .iter()
            .copied()
            .find(|c| c.is_primary())
            .ok_or_else(|| {
                ResolveError::ConsistencyViolation(format!(
                    "component of {} contact(s) has no primary",
                    component.len()
                ))
            })?;

        let mut emails = OrderedSet::new();
        let mut phone_numbers = OrderedSet::new();
        for contact in std::iter::once(primary).chain(ordered.iter().copied()) {
            if let Some(email) = &contact.email {
                emails.insert(email);
            }
            if let Some(phone) = &contact.phone {
                phone_numbers.insert(phone);
            }
        }

        let secondary_contact_ids = ordered
            .iter()
            .filter(|c| c.id != primary.id)
            .map(|c| c.id)
            .collect();

        Ok(Self {
            primary_contact_id: primary.id,
            emails,
            phone_numbers,
            secondary_contact_ids,
        })
    }

    /// View of a component made of a single, freshly created primary.
    pub fn singleton(contact: &Contact) -> Result<Self> {
        Self::build(std::slice::from_ref(contact))
    }
}
