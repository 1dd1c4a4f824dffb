//! Error taxonomy for identity resolution.

/// Errors returned by [`resolve_identity`](crate::resolve::resolve_identity)
/// and [`lookup_identity`](crate::resolve::lookup_identity).
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Neither identifying field was supplied. Raised before any store access.
    #[error("validation error: {0}")]
    Validation(String),

    /// Any failure from the persistence layer, propagated unchanged.
    #[error(transparent)]
    Store(#[from] anyhow::Error),

    /// A component was observed in a state the invariants rule out.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    /// No live contact has the requested id.
    #[error("contact not found: {0}")]
    NotFound(i64),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
