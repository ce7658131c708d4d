//! Unified application error model and mapping helpers.
//! Every gateway operation returns `AppResult<T>`; the HTTP layer turns an
//! `AppError` into a status code and a JSON `{"detail": ...}` body. Internal
//! detail (storage failures, which column clashed) is logged, never returned.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::security::CredentialError;
use crate::storage::StoreError;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("bad_request: {message}")]
    BadRequest { message: String },
    /// Missing or malformed bearer header, bad signature, expired token.
    #[error("unauthenticated")]
    Unauthenticated,
    /// Login with an unknown email or a wrong password.
    #[error("invalid_credentials")]
    InvalidCredentials,
    #[error("forbidden")]
    Forbidden,
    #[error("not_found: {message}")]
    NotFound { message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    /// The request outlived the configured timeout.
    #[error("timeout")]
    Timeout,
    #[error("internal: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn bad_request<S: Into<String>>(msg: S) -> Self { AppError::BadRequest { message: msg.into() } }
    pub fn not_found<S: Into<String>>(msg: S) -> Self { AppError::NotFound { message: msg.into() } }
    pub fn conflict<S: Into<String>>(msg: S) -> Self { AppError::Conflict { message: msg.into() } }
    pub fn internal<S: Into<String>>(msg: S) -> Self { AppError::Internal { message: msg.into() } }

    pub fn code_str(&self) -> &'static str {
        match self {
            AppError::BadRequest { .. } => "bad_request",
            AppError::Unauthenticated => "unauthenticated",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Forbidden => "forbidden",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::Timeout => "timeout",
            AppError::Internal { .. } => "internal",
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the caller. Authentication failures share one message per
    /// kind so the response never says why a token or password was rejected.
    pub fn public_message(&self) -> String {
        match self {
            AppError::BadRequest { message }
            | AppError::NotFound { message }
            | AppError::Conflict { message } => message.clone(),
            AppError::Unauthenticated => "not authenticated".to_string(),
            AppError::InvalidCredentials => "invalid credentials".to_string(),
            AppError::Forbidden => "forbidden".to_string(),
            AppError::Timeout => "request timed out".to_string(),
            AppError::Internal { .. } => "internal server error".to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { field } => {
                tracing::debug!(target: "timesheet::storage", field, "unique key conflict");
                AppError::conflict("email or username already exists")
            }
            StoreError::NotFound { what } => AppError::not_found(format!("{} not found", what)),
            other => AppError::internal(other.to_string()),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if let AppError::Internal { message } = &self {
            tracing::error!(target: "timesheet::http", "internal error: {}", message);
        }
        let body = Json(serde_json::json!({ "detail": self.public_message() }));
        let mut resp = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            resp.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        resp
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
