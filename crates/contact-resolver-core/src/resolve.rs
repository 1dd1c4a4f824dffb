//! Identity resolution over a [`ContactStore`].
//!
//! The resolver works entirely through the store traits, with no database or
//! configuration dependencies. A call runs inside one unit of work:
//!
//! 1. Look up contacts whose email or phone matches the fragment.
//! 2. If none match, create a primary and return its singleton view.
//! 3. Expand the matches to their full connected component.
//! 4. Create a secondary under the oldest primary when the fragment is not an
//!    exact match and carries an email or phone the component lacks.
//! 5. If the component now holds several primaries, keep the oldest and
//!    demote the rest, relinking their secondaries so no secondary ever
//!    points at another secondary.
//! 6. Build the [`ConsolidatedView`] and commit.

use tracing::{debug, info};

use crate::error::{ResolveError, Result};
use crate::models::{Contact, IdentityFragment, LinkPrecedence, NewContact};
use crate::store::{ContactStore, ContactTx};
use crate::view::ConsolidatedView;

/// Resolve a raw `(email, phone)` pair.
///
/// Fails with [`ResolveError::Validation`] before touching the store when
/// both fields are absent or empty.
pub async fn resolve_identity(
    store: &dyn ContactStore,
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<ConsolidatedView> {
    let fragment = IdentityFragment::new(email.map(str::to_string), phone.map(str::to_string))?;
    resolve_fragment(store, &fragment).await
}

/// Resolve a validated fragment, creating or merging contacts as needed.
pub async fn resolve_fragment(
    store: &dyn ContactStore,
    fragment: &IdentityFragment,
) -> Result<ConsolidatedView> {
    let email = fragment.email();
    let phone = fragment.phone();
    let mut tx = store.begin().await?;

    let seeds = tx.find_direct_matches(email, phone).await?;
    debug!(seeds = seeds.len(), "seed lookup");

    if seeds.is_empty() {
        let created = tx
            .insert(NewContact {
                email,
                phone,
                linked_id: None,
                link_precedence: LinkPrecedence::Primary,
            })
            .await?;
        tx.commit().await?;
        info!(contact_id = created.id, "created primary contact");
        return ConsolidatedView::singleton(&created);
    }

    let seed_ids: Vec<i64> = seeds.iter().map(|c| c.id).collect();
    let mut component = tx.find_component(&seed_ids).await?;

    let exact = is_exact_match(&component, email, phone);
    let new_info = has_new_information(&component, email, phone);
    debug!(
        members = component.len(),
        exact_match = exact,
        new_information = new_info,
        "component loaded"
    );

    if !exact && new_info {
        let target_id = oldest_primary(&component)?.id;
        let created = tx
            .insert(NewContact {
                email,
                phone,
                linked_id: Some(target_id),
                link_precedence: LinkPrecedence::Secondary,
            })
            .await?;
        info!(
            contact_id = created.id,
            primary_id = target_id,
            "created secondary contact"
        );
        component.push(created);
    }

    merge_primaries(&mut tx, &mut component).await?;

    let view = ConsolidatedView::build(&component)?;
    tx.commit().await?;
    Ok(view)
}

/// Consolidated view of the identity containing `contact_id`. Read-only.
pub async fn lookup_identity(store: &dyn ContactStore, contact_id: i64) -> Result<ConsolidatedView> {
    let mut tx = store.begin().await?;
    if tx.find_contact(contact_id).await?.is_none() {
        return Err(ResolveError::NotFound(contact_id));
    }
    let component = tx.find_component(&[contact_id]).await?;
    ConsolidatedView::build(&component)
}

/// Some single member satisfies every field the fragment provides.
fn is_exact_match(component: &[Contact], email: Option<&str>, phone: Option<&str>) -> bool {
    component.iter().any(|c| {
        email.map_or(true, |e| c.email.as_deref() == Some(e))
            && phone.map_or(true, |p| c.phone.as_deref() == Some(p))
    })
}

/// The fragment provides an email or phone that no member holds.
fn has_new_information(component: &[Contact], email: Option<&str>, phone: Option<&str>) -> bool {
    let email_is_new =
        email.is_some_and(|e| !component.iter().any(|c| c.email.as_deref() == Some(e)));
    let phone_is_new =
        phone.is_some_and(|p| !component.iter().any(|c| c.phone.as_deref() == Some(p)));
    email_is_new || phone_is_new
}

/// Oldest primary by `(created_at, id)`.
fn oldest_primary(component: &[Contact]) -> Result<&Contact> {
    component
        .iter()
        .filter(|c| c.is_primary())
        .min_by_key(|c| c.age_key())
        .ok_or_else(|| {
            let ids: Vec<i64> = component.iter().map(|c| c.id).collect();
            ResolveError::ConsistencyViolation(format!("no primary among contacts {:?}", ids))
        })
}

/// Collapse every primary but the oldest into it, in the store and in
/// `component`.
async fn merge_primaries(tx: &mut Box<dyn ContactTx>, component: &mut [Contact]) -> Result<()> {
    let survivor_id = oldest_primary(component)?.id;
    let demoted: Vec<i64> = component
        .iter()
        .filter(|c| c.is_primary() && c.id != survivor_id)
        .map(|c| c.id)
        .collect();
    if demoted.is_empty() {
        return Ok(());
    }

    for &old_primary_id in &demoted {
        let updated = tx.demote(old_primary_id, survivor_id).await?;
        tx.relink_children(old_primary_id, survivor_id).await?;
        if let Some(slot) = component.iter_mut().find(|c| c.id == old_primary_id) {
            *slot = updated;
        }
    }

    for contact in component.iter_mut() {
        if contact.linked_id.is_some_and(|l| demoted.contains(&l)) {
            contact.linked_id = Some(survivor_id);
        }
    }

    info!(
        primary_id = survivor_id,
        demoted = ?demoted,
        "merged identities"
    );
    Ok(())
}
