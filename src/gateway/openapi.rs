//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::account::{Balance, DirectoryEntry, UserProfile, UserWithBalances};
use crate::fx::RateEntry;
use crate::gateway::handlers::HealthResponse;
use crate::money::Currency;
use crate::transfer::state::{StatusLegendEntry, TransactionStatus};
use crate::transfer::types::{
    Counterparty, CreateTransactionRequest, Direction, TransactionRecord, TransactionView,
};
use crate::user_auth::{AuthResponse, LoginRequest, RegisterRequest};

/// JWT bearer authentication security scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let mut scheme = Http::new(HttpAuthScheme::Bearer);
            scheme.bearer_format = Some("JWT".to_string());
            scheme.description =
                Some("Token from POST /api/v1/auth/login, valid for 24 hours".to_string());
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(scheme));
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "RemitFlow API",
        version = "0.1.0",
        description = "Cross-border P2P transfers with multi-currency balances and deferred settlement.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        // Public
        crate::gateway::handlers::health_check,
        crate::gateway::handlers::get_statuses,
        crate::gateway::handlers::get_rates,
        crate::user_auth::handlers::register,
        crate::user_auth::handlers::login,
        // Private (JWT)
        crate::gateway::handlers::get_balances,
        crate::gateway::handlers::get_transactions,
        crate::gateway::handlers::create_transaction,
        crate::gateway::handlers::get_transaction,
        crate::gateway::handlers::get_users,
        crate::user_auth::handlers::get_user_by_email,
    ),
    components(
        schemas(
            HealthResponse,
            Currency,
            Balance,
            UserProfile,
            UserWithBalances,
            DirectoryEntry,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            CreateTransactionRequest,
            TransactionStatus,
            TransactionRecord,
            TransactionView,
            Direction,
            Counterparty,
            StatusLegendEntry,
            RateEntry,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Account", description = "Balance queries (auth required)"),
        (name = "Transfer", description = "Cross-border transfers (auth required)"),
        (name = "Users", description = "User directory (auth required)"),
        (name = "Reference", description = "Status legend and exchange rates"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;
