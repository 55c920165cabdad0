// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use super::{ApiResult, AppError, CreatedResult, ValidJson, created, ok};
use crate::adapter::{self, Filter, Record, Table};
use crate::auth::{self, AuthUser};
use crate::state::AppState;
use anyhow::Context;
use axum::extract::State;
use chrono::Utc;
use common::{AuthSession, LoginPayload, RegisterPayload, User};
use tracing::{debug, info};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Handler for creating an account.
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterPayload>,
) -> CreatedResult<AuthSession> {
    let email = normalize_email(&payload.email);
    debug!("Received registration request for {}", email);

    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let existing: Option<User> =
        adapter::find_one(&mut conn, Table::Users, &Filter::new().eq("email", email.as_str()))
            .await?;
    drop(conn);
    if existing.is_some() {
        return Err(AppError::conflict("Email already registered."));
    }

    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .context("Password hashing task failed")??;

    // A racing registration for the same email trips the unique index (409).
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let now = Utc::now();
    let user: User = adapter::insert(
        &mut conn,
        Table::Users,
        &Record::new()
            .set("name", payload.name.trim())
            .set("email", email)
            .set("password_hash", password_hash)
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await?;

    let token = state.tokens.issue(user.id, &user.email)?;
    info!("User {} registered with ID {}", user.email, user.id);
    created("User registered successfully.", AuthSession { user, token })
}

/// Handler for exchanging credentials for a token.
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginPayload>,
) -> ApiResult<AuthSession> {
    let email = normalize_email(&payload.email);
    debug!("Login attempt for {}", email);

    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let user: Option<User> = adapter::find_one(
        &mut conn,
        Table::Users,
        &Filter::new().eq("email", email.as_str()).live(),
    )
    .await?;
    drop(conn);
    let Some(user) = user else {
        return Err(AppError::unauthorized("Invalid credentials."));
    };

    let password = payload.password;
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .context("Password verification task failed")??;
    if !valid {
        return Err(AppError::unauthorized("Invalid credentials."));
    }

    let token = state.tokens.issue(user.id, &user.email)?;
    info!("User {} logged in", user.id);
    ok("Login successful.", AuthSession { user, token })
}

/// Handler returning the user behind the presented token.
pub async fn verify(State(state): State<AppState>, caller: AuthUser) -> ApiResult<User> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let user: User = adapter::find_one(&mut conn, Table::Users, &Filter::id(caller.id).live())
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists."))?;
    ok("Token is valid.", user)
}

/// Handler revoking the presented token.
pub async fn logout(State(state): State<AppState>, caller: AuthUser) -> ApiResult<()> {
    state.tokens.revoke(&caller.token, caller.expires_at);
    info!("User {} logged out", caller.id);
    ok("Logged out successfully.", ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenService;
    use crate::database::in_memory_pool;
    use axum::http::StatusCode;
    use chrono::Duration;

    async fn state() -> AppState {
        let pool = in_memory_pool().await.unwrap();
        AppState::new(pool, TokenService::new(b"test-secret", Duration::hours(1)))
    }

    fn payload(email: &str) -> ValidJson<RegisterPayload> {
        ValidJson(RegisterPayload {
            name: "Ana".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
        })
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts_case_insensitively() {
        let state = state().await;
        let (status, _) = register(State(state.clone()), payload("ana@x.com"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let err = register(State(state), payload("ANA@x.com")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_racing_registrations_share_one_connection() {
        // Hashing holds no pooled connection; whichever request loses gets a
        // 409 from the duplicate check or from the unique index.
        let state = state().await;
        let (first, second) = tokio::join!(
            register(State(state.clone()), payload("ana@x.com")),
            register(State(state.clone()), payload("ana@x.com")),
        );
        let mut statuses = vec![
            first.map(|(status, _)| status).unwrap_or_else(|err| err.status()),
            second.map(|(status, _)| status).unwrap_or_else(|err| err.status()),
        ];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);

        let (status, _) = register(State(state), payload("bob@x.com")).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let state = state().await;
        register(State(state.clone()), payload("ana@x.com")).await.unwrap();

        let err = login(
            State(state.clone()),
            ValidJson(LoginPayload {
                email: "ana@x.com".to_string(),
                password: "nope-nope".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "Invalid credentials.");

        let session = login(
            State(state),
            ValidJson(LoginPayload {
                email: "ana@x.com".to_string(),
                password: "secret123".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(!session.0.data.token.is_empty());
    }
}
