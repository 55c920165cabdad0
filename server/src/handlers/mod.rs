// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! HTTP handlers, one module per resource, plus the error type and the
//! extractors they share.
pub mod activities;
pub mod auth;
pub mod boards;
pub mod cards;
pub mod comments;
pub mod labels;
pub mod lists;
pub mod workspaces;

use crate::auth::AuthError;
use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use common::{ApiResponse, FieldError, Validate};
use serde::de::DeserializeOwned;

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;
pub type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

pub fn ok<T>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::new(message, data)))
}

pub fn created<T>(message: impl Into<String>, data: T) -> CreatedResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::new(message, data))))
}

/// JSON body extractor that answers malformed bodies and invalid payloads
/// with a JSON 400 instead of axum's plain-text rejection.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::new(StatusCode::BAD_REQUEST, &rejection.body_text()))?;
        payload.validate().map_err(AppError::validation)?;
        Ok(Self(payload))
    }
}

/// `Path` extractor whose rejection is a JSON 400.
pub struct ValidPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(&rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `Query` extractor whose rejection is a JSON 400.
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(&rejection.body_text()))?;
        Ok(Self(value))
    }
}

// --- Custom Error Handling ---

/// Our custom error type for the application.
#[derive(Debug)]
pub struct AppError {
    code: StatusCode,
    message: String,
    details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: &str) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn validation(errors: Vec<FieldError>) -> Self {
        tracing::debug!("Validation failed: {:?}", errors);
        Self {
            code: StatusCode::BAD_REQUEST,
            message: "Validation failed".to_string(),
            details: Some(serde_json::json!(errors)),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    })
}

/// Database and other internal failures. Unique constraint violations become
/// 409; everything else is logged and answered with a generic 500.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if is_unique_violation(&err) {
            tracing::warn!("Unique constraint violated: {:#}", err);
            return Self::conflict("Resource already exists.");
        }
        // Log the internal error for debugging.
        tracing::error!("Internal server error: {:?}", err);
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred.".to_string(),
            // Only development builds echo the cause back to the client.
            details: cfg!(debug_assertions).then(|| serde_json::json!(format!("{err:#}"))),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => Self::unauthorized("Access token required."),
            AuthError::InvalidToken => Self::unauthorized("Invalid token."),
            AuthError::TokenExpired => Self::unauthorized("Token expired."),
            AuthError::TokenRevoked => Self::unauthorized("Token has been revoked."),
            other => anyhow::Error::new(other).into(),
        }
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.code.is_server_error() {
            tracing::error!(
                "Responding with error: status_code={}, message={}",
                self.code.as_u16(),
                self.message
            );
        } else {
            tracing::debug!(
                "Responding with error: status_code={}, message={}",
                self.code.as_u16(),
                self.message
            );
        }
        let body = match self.details {
            Some(details) => serde_json::json!({ "error": self.message, "details": details }),
            None => serde_json::json!({ "error": self.message }),
        };
        (self.code, Json(body)).into_response()
    }
}
