pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::user_auth;
use state::AppState;

/// Build the full router: auth, public and JWT-protected private routes plus docs
pub fn create_app(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Auth Routes
    // ==========================================================================
    let auth_routes = Router::new()
        .route("/register", post(user_auth::handlers::register))
        .route("/login", post(user_auth::handlers::login));

    // ==========================================================================
    // Public Routes (no auth required)
    // ==========================================================================
    let public_routes = Router::new()
        .route("/statuses", get(handlers::get_statuses))
        .route("/rates", get(handlers::get_rates));

    // ==========================================================================
    // Private Routes (JWT required)
    // ==========================================================================
    let private_routes = Router::new()
        .route("/balances", get(handlers::get_balances))
        .route(
            "/transactions",
            get(handlers::get_transactions).post(handlers::create_transaction),
        )
        .route("/transactions/{tx_id}", get(handlers::get_transaction))
        .route("/users", get(handlers::get_users))
        .route("/users/lookup", get(user_auth::handlers::get_user_by_email))
        .layer(from_fn_with_state(
            state.clone(),
            user_auth::jwt_auth_middleware,
        ));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/public", public_routes)
        .nest("/api/v1/private", private_routes)
        .with_state(state)
        // OpenAPI / Swagger UI (stateless, added after with_state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Bind `host:port` and serve until `shutdown` resolves
pub async fn run_server<F>(
    host: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);

    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr} (port already in use?)"))?;

    tracing::info!(%addr, "Gateway listening");
    tracing::info!("API docs: http://{addr}/docs");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("gateway server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}
