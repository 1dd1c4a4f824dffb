//! HTTP server for identity resolution.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/identify` | Resolve an email/phone fragment into its consolidated identity |
//! | `GET`  | `/contacts/{id}` | Consolidated identity containing a contact |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Either email or phoneNumber must be provided" } }
//! ```
//!
//! Error codes: `bad_request` (4xx), `not_found` (404), `internal` (500).
//! Internal failures are logged and never described to the caller.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use contact_resolver_core::{
    lookup_identity, resolve_identity, ContactStore, IdentifyResponse, ResolveError,
};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn ContactStore>,
}

/// Starts the HTTP server against the SQLite database in `config`.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = SqliteStore::connect(config).await?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "contact resolver listening");
    serve(listener, Arc::new(store)).await
}

/// Serves the API on an already-bound listener with any store backend.
pub async fn serve(
    listener: tokio::net::TcpListener,
    store: Arc<dyn ContactStore>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(store)).await?;
    Ok(())
}

/// Builds the route table.
pub fn router(store: Arc<dyn ContactStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/identify", post(handle_identify))
        .route("/contacts/{id}", get(handle_get_contact))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { store })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: "Internal Server Error".to_string(),
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Validation(message) => bad_request(message),
            ResolveError::NotFound(id) => not_found(format!("contact not found: {}", id)),
            other => {
                error!(error = %other, "identity resolution failed");
                internal_error()
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: rejection.status(),
            code: "bad_request".to_string(),
            message: rejection.body_text(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /identify ============

/// Inbound identity fragment. Both fields are optional on the wire.
#[derive(Debug, Default, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "phoneNumber")]
    pub phone_number: Option<PhoneNumber>,
}

/// Clients send phone numbers either as strings or as bare JSON integers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PhoneNumber {
    Text(String),
    Number(serde_json::Number),
}

impl PhoneNumber {
    /// The phone as text. `None` for non-integer numbers such as `1.5` or `1e3`.
    pub fn into_string(self) -> Option<String> {
        match self {
            PhoneNumber::Text(s) => Some(s),
            PhoneNumber::Number(n) => n
                .as_u64()
                .map(|v| v.to_string())
                .or_else(|| n.as_i64().map(|v| v.to_string())),
        }
    }
}

async fn handle_identify(
    State(state): State<AppState>,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> Result<Json<IdentifyResponse>, AppError> {
    let Json(request) = payload?;
    let phone = request
        .phone_number
        .map(|p| {
            p.into_string()
                .ok_or_else(|| bad_request("phoneNumber must be a string or an integer"))
        })
        .transpose()?;

    let view = resolve_identity(
        state.store.as_ref(),
        request.email.as_deref(),
        phone.as_deref(),
    )
    .await?;

    Ok(Json(view.into()))
}

// ============ GET /contacts/{id} ============

async fn handle_get_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IdentifyResponse>, AppError> {
    let view = lookup_identity(state.store.as_ref(), id).await?;
    Ok(Json(view.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_number_accepts_string_or_number() {
        let req: IdentifyRequest =
            serde_json::from_str(r#"{"email": null, "phoneNumber": 123456}"#).unwrap();
        assert_eq!(req.phone_number.unwrap().into_string().as_deref(), Some("123456"));

        let req: IdentifyRequest = serde_json::from_str(r#"{"phoneNumber": "0044"}"#).unwrap();
        assert_eq!(req.phone_number.unwrap().into_string().as_deref(), Some("0044"));
        assert!(req.email.is_none());
    }

    #[test]
    fn test_phone_number_rejects_fractional_numbers() {
        for body in [r#"{"phoneNumber": 1.5}"#, r#"{"phoneNumber": 1e3}"#] {
            let req: IdentifyRequest = serde_json::from_str(body).unwrap();
            assert_eq!(req.phone_number.unwrap().into_string(), None, "{}", body);
        }
    }

    #[test]
    fn test_error_mapping() {
        let err = AppError::from(ResolveError::Validation("missing".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = AppError::from(ResolveError::NotFound(7));
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = AppError::from(ResolveError::Store(anyhow::anyhow!("disk full")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("disk"), "store detail leaked");

        let err = AppError::from(ResolveError::ConsistencyViolation("no primary".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "internal");
    }
}
