//! Storage abstraction for Contact Resolver.
//!
//! The [`ContactStore`] trait hands out units of work ([`ContactTx`]) that
//! carry every lookup and mutation the resolver needs. A unit of work holds
//! exclusive access to the contact table until it is committed or dropped,
//! so a whole resolution (seed lookup, closure, writes) is serialised against
//! every other resolution touching the same store.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{sort_by_age, Contact, NewContact};

/// Abstract storage backend for contacts.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Open a unit of work with exclusive access to the contact table.
    async fn begin(&self) -> Result<Box<dyn ContactTx>>;
}

/// A single unit of work against a [`ContactStore`].
///
/// Every query excludes soft-deleted records. Dropping a transaction without
/// calling [`commit`](ContactTx::commit) discards all of its writes.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_direct_matches`](ContactTx::find_direct_matches) | Field-level match on email or phone |
/// | [`find_linked`](ContactTx::find_linked) | One traversal hop over `linked_id` edges |
/// | [`find_component`](ContactTx::find_component) | Full connected component from seeds |
/// | [`find_contact`](ContactTx::find_contact) | Fetch a single live contact |
/// | [`insert`](ContactTx::insert) | Create a contact |
/// | [`demote`](ContactTx::demote) | Turn a primary into a secondary |
/// | [`relink_children`](ContactTx::relink_children) | Repoint secondaries to a new primary |
#[async_trait]
pub trait ContactTx: Send {
    /// Records whose email equals `email` or whose phone equals `phone`,
    /// oldest first. An absent argument adds no condition.
    async fn find_direct_matches(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>>;

    /// Records whose `id` is in `ids` or whose `linked_id` is in `ids`.
    async fn find_linked(&mut self, ids: &[i64]) -> Result<Vec<Contact>>;

    /// Fetch a live contact by id.
    async fn find_contact(&mut self, id: i64) -> Result<Option<Contact>>;

    /// Store a new contact, assigning its id and timestamps.
    async fn insert(&mut self, contact: NewContact<'_>) -> Result<Contact>;

    /// Mark `contact_id` secondary and link it to `new_linked_id`.
    async fn demote(&mut self, contact_id: i64, new_linked_id: i64) -> Result<Contact>;

    /// Repoint every record linked to `old_primary_id` at `new_primary_id`.
    async fn relink_children(&mut self, old_primary_id: i64, new_primary_id: i64) -> Result<()>;

    /// Make all writes of this unit of work durable.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// The connected component reachable from `seed_ids`, oldest first.
    ///
    /// Breadth-first over the undirected `linked_id` relation. The visited
    /// set bounds the walk even if a secondary ever points at a secondary.
    async fn find_component(&mut self, seed_ids: &[i64]) -> Result<Vec<Contact>> {
        let mut visited: HashSet<i64> = HashSet::new();
        let mut members: BTreeMap<i64, Contact> = BTreeMap::new();
        let mut frontier: Vec<i64> = seed_ids
            .iter()
            .copied()
            .filter(|id| visited.insert(*id))
            .collect();

        while !frontier.is_empty() {
            let found = self.find_linked(&frontier).await?;
            let mut next = Vec::new();
            for contact in found {
                for id in std::iter::once(contact.id).chain(contact.linked_id) {
                    if visited.insert(id) {
                        next.push(id);
                    }
                }
                members.entry(contact.id).or_insert(contact);
            }
            frontier = next;
        }

        let mut component: Vec<Contact> = members.into_values().collect();
        sort_by_age(&mut component);
        Ok(component)
    }
}
