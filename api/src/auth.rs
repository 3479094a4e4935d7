//! Token authentication
//!
//! Clients send `Authorization: Token <key>` (or `Bearer <key>`). Keys are
//! 32 random bytes, hex encoded, and only their SHA-256 digest is stored.
//! Passwords are hashed with Argon2.

use agro_core::{AgroError, AgroStore, Result, User};
use argon2::{
    password_hash::{rand_core::OsRng, rand_core::RngCore, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use sha2::{Digest, Sha256};

use crate::{error::ApiError, state::AppState};

const TOKEN_SCHEMES: [&str; 2] = ["Token ", "Bearer "];

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AgroError::Internal(format!("password hash error: {e}")))
}

/// `false` for a wrong password or an unreadable hash
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash cannot be parsed: {}", e);
            false
        }
    }
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a token for `user_id` and persist its digest
pub async fn issue_token(store: &dyn AgroStore, user_id: i64) -> Result<String> {
    let token = generate_token();
    store.store_token(user_id, &hash_token(&token)).await?;
    Ok(token)
}

fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    TOKEN_SCHEMES
        .iter()
        .find_map(|scheme| value.strip_prefix(scheme))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    /// Fail unless the caller is `owner` or an administrator
    pub fn ensure_owner(&self, owner: i64, entity: &str) -> Result<()> {
        if self.0.id == owner || self.0.is_admin {
            Ok(())
        } else {
            Err(AgroError::forbidden_not_owner(entity))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or_else(|| {
            AgroError::Unauthorized("Authentication credentials were not provided".to_string())
        })?;

        let user = state
            .store
            .user_for_token(&hash_token(token))
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| AgroError::Unauthorized("Invalid token".to_string()))?;

        Ok(Self(user))
    }
}
