//! SQLite-backed [`ContactStore`] implementation.
//!
//! Each unit of work is a pool transaction that takes the database write
//! lock with its first statement. Concurrent resolutions therefore run one
//! after another, waiting on the configured busy timeout, and a resolution
//! that fails half-way rolls back as a whole.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use contact_resolver_core::models::{Contact, NewContact};
use contact_resolver_core::store::{ContactStore, ContactTx};

use crate::config::Config;
use crate::db;

const CONTACT_COLUMNS: &str =
    "id, email, phone, linked_id, link_precedence, created_at, updated_at, deleted_at";

/// SQLite implementation of the [`ContactStore`] trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the pool described by `config`. Migrations must already have run.
    pub async fn connect(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ContactStore for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn ContactTx>> {
        let mut tx = self.pool.begin().await?;
        // A write as the first statement takes the write lock before any read.
        sqlx::query("UPDATE contacts SET id = id WHERE 0")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(SqliteTx { tx }))
    }
}

struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

fn row_to_contact(row: &SqliteRow) -> Result<Contact> {
    let precedence: String = row.try_get("link_precedence")?;
    Ok(Contact {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        linked_id: row.try_get("linked_id")?,
        link_precedence: precedence.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

/// Each id is bound twice per query; this keeps a query far below SQLite's
/// bound-parameter limit.
const MAX_IDS_PER_QUERY: usize = 500;

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[async_trait]
impl ContactTx for SqliteTx {
    async fn find_direct_matches(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>> {
        if email.is_none() && phone.is_none() {
            return Ok(Vec::new());
        }
        // `= NULL` never matches, so an absent field adds no condition.
        let sql = format!(
            "SELECT {} FROM contacts \
             WHERE deleted_at IS NULL AND (email = ? OR phone = ?) \
             ORDER BY created_at ASC, id ASC",
            CONTACT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(email)
            .bind(phone)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(row_to_contact).collect()
    }

    async fn find_linked(&mut self, ids: &[i64]) -> Result<Vec<Contact>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        // A record can match in two chunks (own id in one, linked_id in another).
        let mut found: BTreeMap<i64, Contact> = BTreeMap::new();
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let p = placeholders(chunk.len());
            let sql = format!(
                "SELECT {} FROM contacts \
                 WHERE deleted_at IS NULL AND (id IN ({}) OR linked_id IN ({}))",
                CONTACT_COLUMNS, p, p
            );
            let mut query = sqlx::query(&sql);
            for id in chunk.iter().chain(chunk.iter()) {
                query = query.bind(*id);
            }
            for row in query.fetch_all(&mut *self.tx).await? {
                let contact = row_to_contact(&row)?;
                found.insert(contact.id, contact);
            }
        }
        Ok(found.into_values().collect())
    }

    async fn find_contact(&mut self, id: i64) -> Result<Option<Contact>> {
        let sql = format!(
            "SELECT {} FROM contacts WHERE id = ? AND deleted_at IS NULL",
            CONTACT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_contact).transpose()
    }

    async fn insert(&mut self, contact: NewContact<'_>) -> Result<Contact> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO contacts (email, phone, linked_id, link_precedence, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(contact.email)
        .bind(contact.phone)
        .bind(contact.linked_id)
        .bind(contact.link_precedence.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        Ok(Contact {
            id: result.last_insert_rowid(),
            email: contact.email.map(str::to_string),
            phone: contact.phone.map(str::to_string),
            linked_id: contact.linked_id,
            link_precedence: contact.link_precedence,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    async fn demote(&mut self, contact_id: i64, new_linked_id: i64) -> Result<Contact> {
        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET link_precedence = 'secondary', linked_id = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(new_linked_id)
        .bind(Utc::now().timestamp_millis())
        .bind(contact_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            bail!("contact {} does not exist", contact_id);
        }
        match self.find_contact(contact_id).await? {
            Some(contact) => Ok(contact),
            None => bail!("contact {} vanished during demotion", contact_id),
        }
    }

    async fn relink_children(&mut self, old_primary_id: i64, new_primary_id: i64) -> Result<()> {
        sqlx::query("UPDATE contacts SET linked_id = ?, updated_at = ? WHERE linked_id = ?")
            .bind(new_primary_id)
            .bind(Utc::now().timestamp_millis())
            .bind(old_primary_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
