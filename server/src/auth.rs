// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Password hashing (Argon2id) and bearer tokens (JWT, HS256).
use crate::handlers::AppError;
use crate::state::AppState;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHashFormat(String),

    #[error("Token encoding error: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,
}

/// Hashes a password with Argon2id and a random salt, returning a PHC string.
///
/// This is CPU bound; call it from `spawn_blocking` inside request handlers.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::HashingFailed(e.to_string()))
}

/// Checks a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| AuthError::InvalidHashFormat(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::HashingFailed(e.to_string())),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies bearer tokens, and remembers tokens revoked by logout
/// until they would have expired anyway.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    // token -> exp timestamp
    revoked: RwLock<HashMap<String, i64>>,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
            revoked: RwLock::new(HashMap::new()),
        }
    }

    pub fn issue(&self, user_id: i64, email: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if self.revoked.read().contains_key(token) {
            return Err(AuthError::TokenRevoked);
        }
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;
        Ok(data.claims)
    }

    pub fn revoke(&self, token: &str, exp: i64) {
        self.revoked.write().insert(token.to_string(), exp);
    }

    /// Forgets revoked tokens that have expired since. Returns how many were dropped.
    pub fn sweep_revoked(&self) -> usize {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.write();
        let before = revoked.len();
        revoked.retain(|_, exp| *exp >= now);
        before - revoked.len()
    }
}

/// The caller of an authenticated endpoint, taken from `Authorization: Bearer`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub token: String,
    pub expires_at: i64,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let claims = state.tokens.verify(token)?;
        debug!("Authenticated user {} ({})", claims.user_id, claims.email);

        Ok(Self {
            id: claims.user_id,
            email: claims.email,
            token: token.to_string(),
            expires_at: claims.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const TEST_SECRET: &[u8] = b"test_secret_key_1234567890";

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("CorrectHorse1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("CorrectHorse1", &hash).unwrap());
        assert!(!verify_password("WrongHorse1", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        let result = verify_password("whatever", "not-a-phc-string");
        assert!(matches!(result, Err(AuthError::InvalidHashFormat(_))));
    }

    #[test]
    fn test_issue_and_verify_token() {
        let tokens = TokenService::new(TEST_SECRET, Duration::hours(1));
        let token = tokens.issue(7, "ana@example.com").unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "ana@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = TokenService::new(TEST_SECRET, Duration::seconds(-10));
        let token = tokens.issue(7, "ana@example.com").unwrap();
        assert!(matches!(tokens.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_token_from_other_secret_is_invalid() {
        let issuer = TokenService::new(b"another_secret_entirely", Duration::hours(1));
        let token = issuer.issue(7, "ana@example.com").unwrap();

        let tokens = TokenService::new(TEST_SECRET, Duration::hours(1));
        assert!(matches!(tokens.verify(&token), Err(AuthError::InvalidToken)));
        assert!(matches!(tokens.verify("garbage"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_revoked_token_until_swept() {
        let tokens = TokenService::new(TEST_SECRET, Duration::hours(1));
        let token = tokens.issue(7, "ana@example.com").unwrap();
        let claims = tokens.verify(&token).unwrap();

        tokens.revoke(&token, claims.exp);
        assert!(matches!(tokens.verify(&token), Err(AuthError::TokenRevoked)));
        // Not expired yet, so the sweep keeps it.
        assert_eq!(tokens.sweep_revoked(), 0);

        tokens.revoke("stale-token", Utc::now().timestamp() - 5);
        assert_eq!(tokens.sweep_revoked(), 1);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
