//! One-shot resolution and lookup from the command line.
//!
//! Used by the `contact-resolver identify` and `contact-resolver get`
//! commands. Both print the same JSON document `POST /identify` returns.

use anyhow::Result;

use contact_resolver_core::{lookup_identity, resolve_identity, IdentifyResponse, ResolveError};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// CLI entry point — resolves one fragment and prints the response.
pub async fn run_identify(config: &Config, email: Option<&str>, phone: Option<&str>) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let result = resolve_identity(&store, email, phone).await;
    store.pool().close().await;
    print_result(result)
}

/// CLI entry point — prints the identity containing contact `id`.
pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let result = lookup_identity(&store, id).await;
    store.pool().close().await;
    print_result(result)
}

fn print_result(
    result: std::result::Result<contact_resolver_core::ConsolidatedView, ResolveError>,
) -> Result<()> {
    match result {
        Ok(view) => {
            let response = IdentifyResponse::from(view);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(ResolveError::Validation(message)) => {
            eprintln!("Error: {}", message);
            std::process::exit(2);
        }
        Err(ResolveError::NotFound(id)) => {
            eprintln!("Error: contact not found: {}", id);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
