//! # Contact Resolver Core
//!
//! Identity resolution for Contact Resolver: the contact model, store
//! abstraction, linkage resolver, and consolidated views.
//!
//! This crate contains no sqlx, HTTP, or filesystem dependencies. Storage
//! is reached only through [`store::ContactStore`]; an in-memory
//! implementation ships in [`store::memory`].

pub mod error;
pub mod models;
pub mod resolve;
pub mod store;
pub mod view;

pub use error::ResolveError;
pub use models::{Contact, IdentityFragment, LinkPrecedence, NewContact};
pub use resolve::{lookup_identity, resolve_fragment, resolve_identity};
pub use store::{ContactStore, ContactTx};
pub use view::{ConsolidatedView, IdentifyResponse, OrderedSet};
