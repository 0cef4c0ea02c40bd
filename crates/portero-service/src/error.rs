//! Service-side authentication errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use portero_token::{StoreError, TokenError};
use serde::Serialize;
use thiserror::Error;

/// Authentication errors surfaced by the service endpoints.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown principal, inactive account or password mismatch.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Request did not include a token where one is required.
    #[error("Token required")]
    MissingToken,

    /// Token failed verification.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// No identity was established for this request.
    #[error("Authentication required")]
    Unauthenticated,

    /// Identity lacks a required authority.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// User not found.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// User already exists.
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Too many login attempts for this username.
    #[error("Too many login attempts")]
    RateLimited,

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.0)
    }
}

impl AuthError {
    /// HTTP status and stable error code for this error.
    #[must_use]
    pub const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            Self::MissingToken => (StatusCode::BAD_REQUEST, "missing_token"),
            Self::Token(TokenError::Expired) => (StatusCode::UNAUTHORIZED, "token_expired"),
            Self::Token(e) if e.is_server_fault() => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            Self::Token(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::PermissionDenied(_) => (StatusCode::FORBIDDEN, "permission_denied"),
            Self::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
            Self::UserExists(_) => (StatusCode::CONFLICT, "user_exists"),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            Self::Storage(_) | Self::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = AuthErrorResponse {
            error: self.to_string(),
            code,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AuthError::InvalidCredentials.status_and_code().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::MissingToken.status_and_code().0, StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::Token(TokenError::InvalidSignature).status_and_code(),
            (StatusCode::UNAUTHORIZED, "invalid_token")
        );
        assert_eq!(
            AuthError::Token(TokenError::SecretTooWeak(4)).status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::PermissionDenied("x".into()).status_and_code().0,
            StatusCode::FORBIDDEN
        );
    }
}
