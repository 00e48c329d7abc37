use axum::{
    Extension, Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use super::service::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use crate::account::{UserProfile, UserWithBalances};
use crate::gateway::types::{ApiError, ApiResponse, ApiResult, error_codes, ok};
use crate::gateway::state::AppState;

fn bad_body(e: JsonRejection) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, e.body_text())
}

/// Register a new user
///
/// POST /api/v1/auth/register
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered with wallet and starting balances", body = ApiResponse<UserWithBalances>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<UserWithBalances> {
    let Json(req) = payload.map_err(bad_body)?;
    let user = state.user_auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

/// Login user
///
/// POST /api/v1/auth/login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Malformed request body"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(req) = payload.map_err(bad_body)?;
    match state.user_auth.sign_in(req).await {
        Ok(resp) => ok(resp),
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            Err(e.into())
        }
    }
}

/// Email lookup query
#[derive(Debug, Deserialize, IntoParams)]
pub struct EmailQuery {
    /// Registered email address
    pub email: String,
}

/// Look up a user by email
///
/// GET /api/v1/private/users/lookup?email=...
#[utoipa::path(
    get,
    path = "/api/v1/private/users/lookup",
    params(EmailQuery),
    responses(
        (status = 200, description = "Public profile of the user", body = ApiResponse<UserProfile>),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user_by_email(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<Claims>,
    Query(q): Query<EmailQuery>,
) -> ApiResult<UserProfile> {
    // Balances stay private to their owner
    let found = state.user_auth.get_user_by_email(&q.email).await?;
    ok(found.profile)
}
