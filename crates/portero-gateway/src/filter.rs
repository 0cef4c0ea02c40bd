//! Gateway edge filter.
//!
//! Fail-closed coarse authorization for everything under the protected
//! prefix. The decision is a pure function of method, path and headers so it
//! can be tested without a server.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE, InvalidHeaderValue},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};

use crate::config::EdgeFilterConfig;
use crate::error::EdgeRejection;
use crate::verify::{Claims, EdgeVerifier, VerifyFailure, list_claim, string_claim};

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Subject of the token.
pub const X_USUARIO: HeaderName = HeaderName::from_static("x-usuario");
/// Comma-joined role names from the token.
pub const X_ROLES: HeaderName = HeaderName::from_static("x-roles");
/// Email claim.
pub const X_EMAIL: HeaderName = HeaderName::from_static("x-email");
/// Token id, or empty.
pub const X_JWT_ID: HeaderName = HeaderName::from_static("x-jwt-id");

const IDENTITY_HEADERS: [HeaderName; 4] = [X_USUARIO, X_ROLES, X_EMAIL, X_JWT_ID];

const OCTET_STREAM: &str = "application/octet-stream";

/// Why a request was let through without a token check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// CORS preflight.
    Preflight,
    /// Path contains an exempt fragment.
    ExemptPath,
    /// Binary upload.
    OctetStream,
    /// Path outside the protected prefix.
    Unprotected,
}

/// Identity headers derived from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityHeaders {
    /// `X-Usuario`: subject, or empty.
    pub user: HeaderValue,
    /// `X-Roles`: comma-joined roles.
    pub roles: HeaderValue,
    /// `X-Email`.
    pub email: HeaderValue,
    /// `X-JWT-Id`: token id, or empty.
    pub token_id: HeaderValue,
}

impl IdentityHeaders {
    /// Set all four headers on `headers`, replacing existing values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(X_USUARIO, self.user.clone());
        headers.insert(X_ROLES, self.roles.clone());
        headers.insert(X_EMAIL, self.email.clone());
        headers.insert(X_JWT_ID, self.token_id.clone());
    }
}

/// Subject of a token the edge filter verified.
///
/// Set on both the request and the response extensions of forwarded
/// requests, so the access log can read it on either side of the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSubject(pub String);

/// Outcome of the edge filter for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Forward untouched.
    PassThrough(PassReason),
    /// Forward with identity headers.
    Forward(IdentityHeaders),
    /// Reject.
    Reject(EdgeRejection),
}

/// Edge filter built once from configuration.
pub struct EdgeFilter {
    config: EdgeFilterConfig,
    secret: SecretString,
    verifier: EdgeVerifier,
}

impl EdgeFilter {
    /// Build the filter. A weak secret is accepted here and reported per
    /// request as a server error; exempt paths keep working.
    #[must_use]
    pub fn new(config: EdgeFilterConfig) -> Self {
        let secret = config.signing_secret();
        if secret.expose_secret().len() < MIN_SECRET_LEN {
            tracing::error!(
                min = MIN_SECRET_LEN,
                "Gateway JWT secret is too short; protected paths will fail"
            );
        } else if config.uses_default_secret() {
            tracing::warn!("Gateway is using the default JWT secret; set jwtSecret before deploying");
        }
        let verifier = EdgeVerifier::new(secret.expose_secret().as_bytes());

        Self {
            config,
            secret,
            verifier,
        }
    }

    /// Filter configuration.
    #[must_use]
    pub const fn config(&self) -> &EdgeFilterConfig {
        &self.config
    }

    /// Decide what to do with a request.
    #[must_use]
    pub fn evaluate(&self, method: &Method, path: &str, headers: &HeaderMap) -> Decision {
        if *method == Method::OPTIONS {
            return Decision::PassThrough(PassReason::Preflight);
        }

        if self
            .config
            .exempt_paths
            .iter()
            .any(|fragment| !fragment.is_empty() && path.contains(fragment.as_str()))
        {
            return Decision::PassThrough(PassReason::ExemptPath);
        }

        if headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.eq_ignore_ascii_case(OCTET_STREAM))
        {
            return Decision::PassThrough(PassReason::OctetStream);
        }

        if self.secret.expose_secret().len() < MIN_SECRET_LEN {
            return Decision::Reject(EdgeRejection::SecretTooWeak);
        }

        if !path.starts_with(self.config.protected_path.as_str()) {
            return Decision::PassThrough(PassReason::Unprotected);
        }

        let Some(token) = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            return Decision::Reject(EdgeRejection::MissingBearer);
        };

        let claims = match self.verifier.verify(token) {
            Ok(claims) => claims,
            Err(VerifyFailure::Expired) => {
                tracing::info!(path = %path, "Rejected expired token");
                return Decision::Reject(EdgeRejection::Expired);
            }
            Err(VerifyFailure::Invalid(reason)) => {
                tracing::info!(path = %path, reason = %reason, "Rejected invalid token");
                return Decision::Reject(EdgeRejection::InvalidToken);
            }
        };

        let roles = list_claim(&claims, &self.config.role_claim);
        if roles.is_empty() {
            return Decision::Reject(EdgeRejection::MissingRoleClaim);
        }
        let Some(email) = string_claim(&claims, &self.config.email_claim) else {
            return Decision::Reject(EdgeRejection::MissingEmailClaim);
        };

        let allowed = roles
            .iter()
            .any(|role| self.config.allowed_roles.iter().any(|a| a.trim() == role));
        if !allowed {
            tracing::info!(path = %path, roles = ?roles, "Rejected: no allowed role");
            return Decision::Reject(EdgeRejection::RoleNotAllowed);
        }

        match identity_headers(&claims, &roles, email) {
            Ok(identity) => Decision::Forward(identity),
            Err(_) => {
                tracing::info!(path = %path, "Rejected: claim not representable as a header");
                Decision::Reject(EdgeRejection::InvalidToken)
            }
        }
    }
}

fn identity_headers(
    claims: &Claims,
    roles: &[String],
    email: &str,
) -> Result<IdentityHeaders, InvalidHeaderValue> {
    Ok(IdentityHeaders {
        user: HeaderValue::from_str(string_claim(claims, "sub").unwrap_or_default())?,
        roles: HeaderValue::from_str(&roles.join(","))?,
        email: HeaderValue::from_str(email)?,
        token_id: HeaderValue::from_str(string_claim(claims, "jti").unwrap_or_default())?,
    })
}

impl std::fmt::Debug for EdgeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeFilter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Remove client-supplied identity headers.
pub fn strip_identity_headers(headers: &mut HeaderMap) {
    for name in IDENTITY_HEADERS {
        headers.remove(name);
    }
}

/// Middleware entry point.
pub async fn edge_filter(
    State(filter): State<Arc<EdgeFilter>>,
    mut request: Request,
    next: Next,
) -> Response {
    strip_identity_headers(request.headers_mut());

    let decision = filter.evaluate(request.method(), request.uri().path(), request.headers());
    match decision {
        Decision::PassThrough(reason) => {
            tracing::trace!(path = %request.uri().path(), ?reason, "Edge filter pass-through");
            next.run(request).await
        }
        Decision::Forward(identity) => {
            identity.apply(request.headers_mut());
            let subject = VerifiedSubject(identity.user.to_str().unwrap_or_default().to_string());
            request.extensions_mut().insert(subject.clone());

            let mut response = next.run(request).await;
            response.extensions_mut().insert(subject);
            response
        }
        Decision::Reject(rejection) => rejection.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;

    const SECRET: &str = "SuperClaveSecretaSeguraQueDebesCambiar";

    fn filter() -> EdgeFilter {
        EdgeFilter::new(EdgeFilterConfig::default())
    }

    fn token(claims: &Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn alice_claims(roles: Value) -> Value {
        json!({
            "sub": "alice",
            "roles": roles,
            "email": "alice@example.com",
            "exp": chrono::Utc::now().timestamp() + 600,
            "jti": "abc123",
        })
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[test]
    fn test_preflight_and_exempt_paths() {
        let f = filter();
        assert_eq!(
            f.evaluate(&Method::OPTIONS, "/api/segura/x", &HeaderMap::new()),
            Decision::PassThrough(PassReason::Preflight)
        );
        assert_eq!(
            f.evaluate(&Method::POST, "/api/segura/login", &HeaderMap::new()),
            Decision::PassThrough(PassReason::ExemptPath)
        );
        assert_eq!(
            f.evaluate(&Method::GET, "/login", &HeaderMap::new()),
            Decision::PassThrough(PassReason::ExemptPath)
        );
    }

    #[test]
    fn test_octet_stream_bypass() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "Application/Octet-Stream".parse().unwrap());
        assert_eq!(
            filter().evaluate(&Method::POST, "/api/segura/upload", &headers),
            Decision::PassThrough(PassReason::OctetStream)
        );

        headers.insert(CONTENT_TYPE, "application/octet-stream; charset=x".parse().unwrap());
        assert_eq!(
            filter().evaluate(&Method::POST, "/api/segura/upload", &headers),
            Decision::Reject(EdgeRejection::MissingBearer)
        );
    }

    #[test]
    fn test_weak_secret_rejects_before_prefix_check() {
        let f = EdgeFilter::new(EdgeFilterConfig {
            jwt_secret: "sixteen-byte-key".to_string(),
            ..EdgeFilterConfig::default()
        });
        assert_eq!(
            f.evaluate(&Method::GET, "/api/segura/pedidos", &HeaderMap::new()),
            Decision::Reject(EdgeRejection::SecretTooWeak)
        );
        assert_eq!(
            f.evaluate(&Method::GET, "/catalogo", &HeaderMap::new()),
            Decision::Reject(EdgeRejection::SecretTooWeak)
        );
        assert_eq!(
            f.evaluate(&Method::GET, "/public/logo.png", &HeaderMap::new()),
            Decision::PassThrough(PassReason::ExemptPath)
        );
    }

    #[test]
    fn test_unprotected_path() {
        assert_eq!(
            filter().evaluate(&Method::GET, "/catalogo/1", &HeaderMap::new()),
            Decision::PassThrough(PassReason::Unprotected)
        );
    }

    #[test]
    fn test_missing_and_malformed_bearer() {
        let f = filter();
        assert_eq!(
            f.evaluate(&Method::GET, "/api/segura/x", &HeaderMap::new()),
            Decision::Reject(EdgeRejection::MissingBearer)
        );

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Token abc".parse().unwrap());
        assert_eq!(
            f.evaluate(&Method::GET, "/api/segura/x", &headers),
            Decision::Reject(EdgeRejection::MissingBearer)
        );
    }

    #[test]
    fn test_invalid_and_expired_tokens() {
        let f = filter();
        assert_eq!(
            f.evaluate(&Method::GET, "/api/segura/x", &bearer("a.b.c")),
            Decision::Reject(EdgeRejection::InvalidToken)
        );

        let mut claims = alice_claims(json!(["ROLE_USER"]));
        claims["exp"] = json!(chrono::Utc::now().timestamp() - 5);
        assert_eq!(
            f.evaluate(&Method::GET, "/api/segura/x", &bearer(&token(&claims))),
            Decision::Reject(EdgeRejection::Expired)
        );
    }

    #[test]
    fn test_missing_claims() {
        let f = filter();

        let no_roles = alice_claims(json!(""));
        assert_eq!(
            f.evaluate(&Method::GET, "/api/segura/x", &bearer(&token(&no_roles))),
            Decision::Reject(EdgeRejection::MissingRoleClaim)
        );

        let mut no_email = alice_claims(json!(["ROLE_USER"]));
        no_email.as_object_mut().unwrap().remove("email");
        assert_eq!(
            f.evaluate(&Method::GET, "/api/segura/x", &bearer(&token(&no_email))),
            Decision::Reject(EdgeRejection::MissingEmailClaim)
        );
    }

    #[test]
    fn test_role_not_allowed() {
        let claims = alice_claims(json!("ROLE_GUEST"));
        assert_eq!(
            filter().evaluate(&Method::GET, "/api/segura/x", &bearer(&token(&claims))),
            Decision::Reject(EdgeRejection::RoleNotAllowed)
        );
    }

    #[test]
    fn test_forward_sets_identity_headers() {
        let claims = alice_claims(json!(["ROLE_USER", "ROLE_AUDITOR", "ROLE_USER"]));
        let Decision::Forward(identity) =
            filter().evaluate(&Method::GET, "/api/segura/x", &bearer(&token(&claims)))
        else {
            panic!("expected forward");
        };

        let mut headers = HeaderMap::new();
        headers.insert(X_USUARIO, "mallory".parse().unwrap());
        identity.apply(&mut headers);

        assert_eq!(headers.get(X_USUARIO).unwrap(), "alice");
        assert_eq!(headers.get(X_ROLES).unwrap(), "ROLE_USER,ROLE_AUDITOR");
        assert_eq!(headers.get(X_EMAIL).unwrap(), "alice@example.com");
        assert_eq!(headers.get(X_JWT_ID).unwrap(), "abc123");
        assert_eq!(headers.get_all(X_USUARIO).iter().count(), 1);
    }

    #[test]
    fn test_comma_separated_role_claim() {
        let f = EdgeFilter::new(EdgeFilterConfig {
            role_claim: "rol".to_string(),
            ..EdgeFilterConfig::default()
        });
        let mut claims = alice_claims(json!(null));
        claims["rol"] = json!(" ROLE_ADMIN , ");
        claims.as_object_mut().unwrap().remove("jti");

        let Decision::Forward(identity) =
            f.evaluate(&Method::GET, "/api/segura/x", &bearer(&token(&claims)))
        else {
            panic!("expected forward");
        };
        assert_eq!(identity.roles, "ROLE_ADMIN");
        assert_eq!(identity.token_id, "");
    }

    #[test]
    fn test_strip_identity_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(X_ROLES, "ROLE_ADMIN".parse().unwrap());
        headers.insert(X_EMAIL, "x@example.com".parse().unwrap());
        headers.insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        strip_identity_headers(&mut headers);
        assert_eq!(headers.len(), 1);
    }
}
