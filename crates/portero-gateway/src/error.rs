//! Gateway rejections and errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Reasons the edge filter refuses a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeRejection {
    /// The configured secret is too short to verify anything.
    #[error("Gateway signing secret is misconfigured")]
    SecretTooWeak,

    /// No `Authorization: Bearer <token>` header.
    #[error("Missing bearer token")]
    MissingBearer,

    /// Token is past its expiry.
    #[error("Token expired")]
    Expired,

    /// Token is malformed or its signature does not verify.
    #[error("Invalid token")]
    InvalidToken,

    /// Token carries no role claim.
    #[error("Token has no roles")]
    MissingRoleClaim,

    /// Token carries no email claim.
    #[error("Token has no email")]
    MissingEmailClaim,

    /// None of the token's roles is allowed on this path.
    #[error("Role not allowed")]
    RoleNotAllowed,
}

impl EdgeRejection {
    /// HTTP status for this rejection.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::SecretTooWeak => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingBearer | Self::Expired | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::MissingRoleClaim | Self::MissingEmailClaim | Self::RoleNotAllowed => {
                StatusCode::FORBIDDEN
            }
        }
    }

    /// Stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SecretTooWeak => "secret_too_weak",
            Self::MissingBearer => "missing_token",
            Self::Expired => "token_expired",
            Self::InvalidToken => "invalid_token",
            Self::MissingRoleClaim => "missing_role_claim",
            Self::MissingEmailClaim => "missing_email_claim",
            Self::RoleNotAllowed => "role_not_allowed",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for EdgeRejection {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Errors from the upstream proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No route matches the request path.
    #[error("No route for {0}")]
    NoRoute(String),

    /// Request body exceeded the configured limit or could not be read.
    #[error("Request body rejected: {0}")]
    Body(String),

    /// Upstream unreachable or failed mid-response.
    #[error("Upstream error: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::NoRoute(_) => (StatusCode::NOT_FOUND, "no_route"),
            Self::Body(_) => (StatusCode::PAYLOAD_TOO_LARGE, "body_rejected"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
        };
        if status == StatusCode::BAD_GATEWAY {
            tracing::warn!(error = %self, "Upstream request failed");
        }
        let body = ErrorBody {
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
    fn test_rejection_statuses() {
        assert_eq!(EdgeRejection::SecretTooWeak.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(EdgeRejection::MissingBearer.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(EdgeRejection::Expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(EdgeRejection::RoleNotAllowed.status(), StatusCode::FORBIDDEN);
        assert_eq!(EdgeRejection::MissingEmailClaim.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_proxy_error_status() {
        let res = ProxyError::NoRoute("/x".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
