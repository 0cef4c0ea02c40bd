//! Per-request identity and the extractors that gate endpoints on it.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Authority required by [`RequireAdmin`].
pub const ADMIN_AUTHORITY: &str = "ROLE_ADMIN";

/// Identity established by the validation filter for one request.
///
/// Lives only in the request's extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Authenticated username.
    pub username: String,
    /// Normalized authorities (`ROLE_` prefixed, unique).
    pub authorities: Vec<String>,
}

impl Identity {
    /// Whether the identity holds `authority`.
    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    /// Require an authority.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if the authority is missing.
    pub fn require_authority(&self, authority: &str) -> Result<(), AuthError> {
        if self.has_authority(authority) {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied(format!("{authority} required")))
        }
    }
}

/// Extractor for authenticated requests.
///
/// Rejects with 401 when the filter established no identity.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Identity);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| AuthError::Unauthenticated.into_response())
    }
}

/// Extractor for optional authentication.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Identity>().cloned()))
    }
}

/// Require admin authority extractor. 401 without identity, 403 without
/// `ROLE_ADMIN`.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Identity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(identity) = RequireAuth::from_request_parts(parts, state).await?;

        identity
            .require_authority(ADMIN_AUTHORITY)
            .map_err(IntoResponse::into_response)?;

        Ok(Self(identity))
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, body::Body, http::Request, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use super::*;

    async fn admin_only(RequireAdmin(identity): RequireAdmin) -> String {
        identity.username
    }

    async fn anyone(OptionalAuth(identity): OptionalAuth) -> String {
        identity.map_or_else(|| "anonymous".to_string(), |i| i.username)
    }

    fn request(identity: Option<Identity>) -> Request<Body> {
        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        if let Some(identity) = identity {
            req.extensions_mut().insert(identity);
        }
        req
    }

    fn identity(authorities: &[&str]) -> Identity {
        Identity {
            username: "alice".to_string(),
            authorities: authorities.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_require_authority() {
        let id = identity(&["ROLE_USER"]);
        assert!(id.has_authority("ROLE_USER"));
        assert!(id.require_authority("ROLE_ADMIN").is_err());
    }

    #[tokio::test]
    async fn test_require_admin_statuses() {
        let app = Router::new().route("/", get(admin_only));

        let res = app.clone().oneshot(request(None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .clone()
            .oneshot(request(Some(identity(&["ROLE_USER"]))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app
            .oneshot(request(Some(identity(&["ROLE_ADMIN"]))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_optional_auth() {
        let app = Router::new().route("/", get(anyone));
        let res = app.oneshot(request(None)).await.unwrap();
        let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"anonymous");
    }
}
