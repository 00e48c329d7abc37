use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

use crate::account::{NewUser, UserWithBalances, Wallet, seed_balances};
use crate::store::LedgerStore;
use crate::transfer::error::TransferError;
use crate::transfer::service::normalize_email;

/// Session token lifetime
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error(transparent)]
    Store(#[from] TransferError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Subject (user_id as string)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
}

impl Claims {
    /// Authenticated user id
    pub fn user_id(&self) -> Result<i64, TransferError> {
        self.sub
            .parse()
            .map_err(|_| TransferError::NotAuthenticated)
    }
}

/// User Registration Request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 128, message = "name is required"))]
    #[schema(example = "Alice")]
    pub name: String,
    #[validate(email(message = "invalid email"))]
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    #[schema(example = "password123")]
    pub password: String,
    #[validate(length(min = 1, max = 64, message = "country is required"))]
    #[schema(example = "DE")]
    pub country: String,
}

/// User Login Request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "password123")]
    pub password: String,
}

/// Auth Response (JWT)
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserWithBalances,
}

pub struct UserAuthService {
    store: Arc<dyn LedgerStore>,
    jwt_secret: String,
}

impl UserAuthService {
    pub fn new(store: Arc<dyn LedgerStore>, jwt_secret: String) -> Self {
        Self { store, jwt_secret }
    }

    /// Register a new user with a fresh wallet and seeded balances
    pub async fn register(&self, req: RegisterRequest) -> Result<UserWithBalances, AuthError> {
        req.validate()
            .map_err(|e| AuthError::InvalidInput(e.to_string()))?;

        // 1. Hash password
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(format!("Hashing failed: {e}")))?
            .to_string();

        // 2. Wallet + starting balances
        let wallet = Wallet::generate();
        let balances = seed_balances();

        // 3. Insert user and balances together
        let user = self
            .store
            .insert_user(
                NewUser {
                    name: req.name.trim().to_string(),
                    email: normalize_email(&req.email),
                    password_hash,
                    country: req.country.trim().to_string(),
                    wallet_address: wallet.address,
                    public_key: wallet.public_key,
                    private_key: wallet.private_key,
                },
                &balances,
            )
            .await
            .map_err(|e| match e {
                TransferError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        tracing::info!(user_id = user.user_id, country = %user.country, "User registered");

        let balances = self.store.get_balances(user.user_id).await?;
        Ok(UserWithBalances {
            profile: user.profile(),
            balances,
        })
    }

    /// Verify credentials and issue a JWT
    pub async fn sign_in(&self, req: LoginRequest) -> Result<AuthResponse, AuthError> {
        // 1. Find user by email
        let user = self
            .store
            .get_user_by_email(&normalize_email(&req.email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // 2. Verify password
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| AuthError::Internal(format!("Invalid hash format: {e}")))?;

        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        // 3. Generate JWT
        let token = self.issue_token(user.user_id)?;

        let balances = self.store.get_balances(user.user_id).await?;
        Ok(AuthResponse {
            token,
            user: UserWithBalances {
                profile: user.profile(),
                balances,
            },
        })
    }

    /// Sign a token for `user_id`
    pub fn issue_token(&self, user_id: i64) -> Result<String, AuthError> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
            .ok_or_else(|| AuthError::Internal("token expiry overflow".into()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("Failed to generate token: {e}")))
    }

    /// Verify JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let token_data =
            decode::<Claims>(token, &decoding_key, &validation).map_err(|_| AuthError::InvalidToken)?;
        Ok(token_data.claims)
    }

    /// Profile and balances of the user registered under `email`
    pub async fn get_user_by_email(&self, email: &str) -> Result<UserWithBalances, AuthError> {
        let user = self
            .store
            .get_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| AuthError::Store(TransferError::not_found("User")))?;

        let balances = self.store.get_balances(user.user_id).await?;
        Ok(UserWithBalances {
            profile: user.profile(),
            balances,
        })
    }
}
