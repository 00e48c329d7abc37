//! User authentication
//!
//! Argon2 password hashes and HS256 session tokens.

pub mod handlers;
pub mod middleware;
pub mod service;

pub use middleware::jwt_auth_middleware;
pub use service::{AuthError, AuthResponse, Claims, LoginRequest, RegisterRequest, UserAuthService};
