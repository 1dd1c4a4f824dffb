//! In-memory [`ContactStore`] implementation for tests and embedding.
//!
//! The contact table lives behind a `tokio::sync::Mutex`. A unit of work
//! holds the owned guard for its whole lifetime and mutates a staged copy,
//! which replaces the table on commit. Dropping the unit of work throws the
//! staged copy away.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::{sort_by_age, Contact, LinkPrecedence, NewContact};

use super::{ContactStore, ContactTx};

#[derive(Debug, Clone, Default)]
struct Table {
    contacts: BTreeMap<i64, Contact>,
    next_id: i64,
}

impl Table {
    fn live(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values().filter(|c| c.deleted_at.is_none())
    }
}

/// In-memory contact store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    table: Arc<Mutex<Table>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `contacts`, as-is.
    ///
    /// Ids assigned afterwards continue from the largest seeded id.
    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        let next_id = contacts.iter().map(|c| c.id).max().unwrap_or(0);
        let contacts = contacts.into_iter().map(|c| (c.id, c)).collect();
        Self {
            table: Arc::new(Mutex::new(Table { contacts, next_id })),
        }
    }

    /// Every stored contact (deleted ones included), ordered by id.
    pub async fn snapshot(&self) -> Vec<Contact> {
        self.table.lock().await.contacts.values().cloned().collect()
    }
}

#[async_trait]
impl ContactStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn ContactTx>> {
        let guard = self.table.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(InMemoryTx { guard, staged }))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<Table>,
    staged: Table,
}

impl InMemoryTx {
    fn live_mut(&mut self, id: i64) -> Result<&mut Contact> {
        match self.staged.contacts.get_mut(&id) {
            Some(c) if c.deleted_at.is_none() => Ok(c),
            _ => bail!("contact {} does not exist", id),
        }
    }
}

#[async_trait]
impl ContactTx for InMemoryTx {
    async fn find_direct_matches(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>> {
        let mut matches: Vec<Contact> = self
            .staged
            .live()
            .filter(|c| {
                (email.is_some() && c.email.as_deref() == email)
                    || (phone.is_some() && c.phone.as_deref() == phone)
            })
            .cloned()
            .collect();
        sort_by_age(&mut matches);
        Ok(matches)
    }

    async fn find_linked(&mut self, ids: &[i64]) -> Result<Vec<Contact>> {
        Ok(self
            .staged
            .live()
            .filter(|c| ids.contains(&c.id) || c.linked_id.is_some_and(|l| ids.contains(&l)))
            .cloned()
            .collect())
    }

    async fn find_contact(&mut self, id: i64) -> Result<Option<Contact>> {
        Ok(self
            .staged
            .contacts
            .get(&id)
            .filter(|c| c.deleted_at.is_none())
            .cloned())
    }

    async fn insert(&mut self, contact: NewContact<'_>) -> Result<Contact> {
        if contact.email.is_none() && contact.phone.is_none() {
            bail!("contact must have an email or a phone");
        }
        if let Some(linked_id) = contact.linked_id {
            if !self.staged.contacts.contains_key(&linked_id) {
                bail!("linked contact {} does not exist", linked_id);
            }
        }
        let now = Utc::now().timestamp_millis();
        self.staged.next_id += 1;
        let stored = Contact {
            id: self.staged.next_id,
            email: contact.email.map(str::to_string),
            phone: contact.phone.map(str::to_string),
            linked_id: contact.linked_id,
            link_precedence: contact.link_precedence,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.staged.contacts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn demote(&mut self, contact_id: i64, new_linked_id: i64) -> Result<Contact> {
        let contact = self.live_mut(contact_id)?;
        contact.link_precedence = LinkPrecedence::Secondary;
        contact.linked_id = Some(new_linked_id);
        contact.updated_at = Utc::now().timestamp_millis();
        Ok(contact.clone())
    }

    async fn relink_children(&mut self, old_primary_id: i64, new_primary_id: i64) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        for contact in self.staged.contacts.values_mut() {
            if contact.linked_id == Some(old_primary_id) {
                contact.linked_id = Some(new_primary_id);
                contact.updated_at = now;
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: i64, email: Option<&str>, phone: Option<&str>, linked_id: Option<i64>) -> Contact {
        Contact {
            id,
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            linked_id,
            link_precedence: if linked_id.is_some() {
                LinkPrecedence::Secondary
            } else {
                LinkPrecedence::Primary
            },
            created_at: id * 1000,
            updated_at: id * 1000,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let a = tx
            .insert(NewContact {
                email: Some("a@x.com"),
                phone: None,
                linked_id: None,
                link_precedence: LinkPrecedence::Primary,
            })
            .await
            .unwrap();
        let b = tx
            .insert(NewContact {
                email: None,
                phone: Some("111"),
                linked_id: Some(a.id),
                link_precedence: LinkPrecedence::Secondary,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_tx_discards_writes() {
        let store = InMemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(NewContact {
                email: Some("a@x.com"),
                phone: None,
                linked_id: None,
                link_precedence: LinkPrecedence::Primary,
            })
            .await
            .unwrap();
        }
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_direct_matches_skip_deleted_and_absent_fields() {
        let mut deleted = contact(2, Some("a@x.com"), None, None);
        deleted.deleted_at = Some(5000);
        let store = InMemoryStore::with_contacts(vec![
            contact(1, None, Some("111"), None),
            deleted,
            contact(3, Some("a@x.com"), Some("222"), None),
        ]);
        let mut tx = store.begin().await.unwrap();

        let found = tx.find_direct_matches(Some("a@x.com"), None).await.unwrap();
        assert_eq!(found.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3]);

        let found = tx
            .find_direct_matches(Some("a@x.com"), Some("111"))
            .await
            .unwrap();
        assert_eq!(found.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 3]);

        assert!(tx.find_direct_matches(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_component_walks_both_directions() {
        // 1 <- 2, 1 <- 3, and 4 is unrelated.
        let store = InMemoryStore::with_contacts(vec![
            contact(1, Some("a@x.com"), None, None),
            contact(2, Some("b@x.com"), None, Some(1)),
            contact(3, None, Some("333"), Some(1)),
            contact(4, Some("d@x.com"), None, None),
        ]);
        let mut tx = store.begin().await.unwrap();

        let ids: Vec<i64> = tx
            .find_component(&[3])
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_component_terminates_on_cycles() {
        // Corrupt state: 1 -> 2 -> 1.
        let mut a = contact(1, Some("a@x.com"), None, Some(2));
        a.link_precedence = LinkPrecedence::Secondary;
        let b = contact(2, Some("b@x.com"), None, Some(1));
        let store = InMemoryStore::with_contacts(vec![a, b]);
        let mut tx = store.begin().await.unwrap();

        let component = tx.find_component(&[1]).await.unwrap();
        assert_eq!(component.len(), 2);
    }

    #[tokio::test]
    async fn test_relink_children_moves_every_child() {
        let store = InMemoryStore::with_contacts(vec![
            contact(1, Some("a@x.com"), None, None),
            contact(2, Some("b@x.com"), None, None),
            contact(3, None, Some("333"), Some(2)),
            contact(4, None, Some("444"), Some(2)),
        ]);
        let mut tx = store.begin().await.unwrap();
        tx.demote(2, 1).await.unwrap();
        tx.relink_children(2, 1).await.unwrap();
        tx.commit().await.unwrap();

        for c in store.snapshot().await.iter().filter(|c| c.id != 1) {
            assert_eq!(c.linked_id, Some(1), "contact {} not relinked", c.id);
            assert_eq!(c.link_precedence, LinkPrecedence::Secondary);
        }
    }
}
