//! Gateway HTTP handlers
//!
//! Public: health, status legend, rate table.
//! Private (JWT): balances, transactions, user directory.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::state::AppState;
use super::types::{ApiError, ApiResponse, ApiResult, error_codes, ok};
use crate::account::{Balance, DirectoryEntry};
use crate::fx::{self, RateEntry};
use crate::transfer::state::{StatusLegendEntry, status_legend};
use crate::transfer::{CreateTransactionRequest, TransactionRecord, TransactionView};
use crate::user_auth::Claims;

/// Health check response data
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    #[schema(example = 1703494800000_i64)]
    pub timestamp_ms: i64,
    /// Storage backend name
    #[schema(example = "postgres")]
    pub store: String,
}

/// Health check endpoint
///
/// Pings the ledger store. Details of a failure are logged, not returned.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service healthy", body = ApiResponse<HealthResponse>),
        (status = 503, description = "Service unavailable")
    ),
    tag = "System"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    if let Err(e) = state.store.ping().await {
        tracing::error!(store = state.store.name(), error = %e, "[HEALTH] Store ping failed");
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            "unavailable",
        ));
    }

    ok(HealthResponse {
        timestamp_ms: Utc::now().timestamp_millis(),
        store: state.store.name().to_string(),
    })
}

/// Transaction status legend
#[utoipa::path(
    get,
    path = "/api/v1/public/statuses",
    responses(
        (status = 200, description = "Every transaction status with its description", body = ApiResponse<Vec<StatusLegendEntry>>)
    ),
    tag = "Reference"
)]
pub async fn get_statuses() -> ApiResult<Vec<StatusLegendEntry>> {
    ok(status_legend())
}

/// Exchange rate table
#[utoipa::path(
    get,
    path = "/api/v1/public/rates",
    responses(
        (status = 200, description = "Conversion multipliers for every supported pair", body = ApiResponse<Vec<RateEntry>>)
    ),
    tag = "Reference"
)]
pub async fn get_rates() -> ApiResult<Vec<RateEntry>> {
    ok(fx::rate_table())
}

/// Balances of the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/private/balances",
    responses(
        (status = 200, description = "Balances ordered by currency", body = ApiResponse<Vec<Balance>>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn get_balances(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Vec<Balance>> {
    let user_id = claims.user_id()?;
    ok(state.transfers.get_balances(user_id).await?)
}

/// Sent and received transactions of the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/private/transactions",
    responses(
        (status = 200, description = "Newest first", body = ApiResponse<Vec<TransactionView>>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfer"
)]
pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Vec<TransactionView>> {
    let user_id = claims.user_id()?;
    let views = state.transfers.list_transactions(user_id).await?;
    ok(views.as_ref().clone())
}

/// Create a transfer
///
/// Returns the INITIATED record immediately; settlement follows after the
/// configured delay.
#[utoipa::path(
    post,
    path = "/api/v1/private/transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transfer accepted", body = ApiResponse<TransactionRecord>),
        (status = 400, description = "Invalid amount or currency"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Receiver not found"),
        (status = 422, description = "Insufficient balance")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfer"
)]
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> ApiResult<TransactionRecord> {
    let user_id = claims.user_id()?;
    // Malformed amounts fail while decoding; report them like any other bad input
    let Json(req) = payload.map_err(|e| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMETER,
            e.body_text(),
        )
    })?;
    let record = state.transfers.create_transaction(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

/// One transaction of the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/private/transactions/{tx_id}",
    params(
        ("tx_id" = String, Path, description = "Transaction ID (tx_...)")
    ),
    responses(
        (status = 200, description = "Transaction found", body = ApiResponse<TransactionRecord>),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Transaction not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfer"
)]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(tx_id): Path<String>,
) -> ApiResult<TransactionRecord> {
    let user_id = claims.user_id()?;
    ok(state.transfers.get_transaction(user_id, &tx_id).await?)
}

/// Every other user, sorted by name
#[utoipa::path(
    get,
    path = "/api/v1/private/users",
    responses(
        (status = 200, description = "User directory without the caller", body = ApiResponse<Vec<DirectoryEntry>>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_users(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Vec<DirectoryEntry>> {
    let user_id = claims.user_id()?;
    ok(state.transfers.list_users(user_id).await?)
}
