//! Login, refresh and session introspection endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use portero_token::{IssuedToken, Principal, bearer_token};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::identity::{Identity, RequireAdmin, RequireAuth};
use crate::state::ServiceState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username.
    pub username: String,
    /// Plaintext password.
    pub password: String,
}

/// Refresh request body.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// The token to refresh. May be expired.
    #[serde(default)]
    pub token: Option<String>,
    /// Email to embed in the new token. Defaults to the old token's email.
    #[serde(default)]
    pub email: Option<String>,
}

/// Role as rendered in responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleView {
    /// Role name.
    pub name: String,
    /// Whether the role is active.
    pub active: bool,
}

/// Principal as rendered in responses (no password hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    /// Username.
    pub username: String,
    /// Email address.
    pub email: Option<String>,
    /// Whether the account is active.
    pub active: bool,
    /// Assigned roles.
    pub roles: Vec<RoleView>,
}

impl From<&Principal> for UserView {
    fn from(p: &Principal) -> Self {
        Self {
            username: p.username.clone(),
            email: p.email.clone(),
            active: p.active,
            roles: p
                .roles
                .iter()
                .map(|r| RoleView {
                    name: r.name.clone(),
                    active: r.active,
                })
                .collect(),
        }
    }
}

/// Response for login and check-token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    /// The authenticated user.
    pub user: UserView,
    /// Bearer token.
    pub token: String,
    /// Token expiry (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// Response for refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub token: String,
    /// Token expiry (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// Response for logout.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable message.
    pub message: String,
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<Arc<ServiceState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    if !state.login_limiter.check(&req.username) {
        tracing::warn!(username = %req.username, "Login throttled");
        return Err(AuthError::RateLimited);
    }

    let principal = state
        .credentials
        .find_by_username(&req.username)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| {
            tracing::info!(username = %req.username, "Login rejected: unknown or inactive user");
            AuthError::InvalidCredentials
        })?;

    // Argon2 is CPU-bound; run it on the blocking pool.
    let passwords = state.passwords.clone();
    let hash = principal.password_hash.clone();
    let password = req.password;
    let matched = tokio::task::spawn_blocking(move || passwords.matches(&password, &hash))
        .await
        .map_err(|e| AuthError::Config(format!("Password check failed: {e}")))?;

    if !matched {
        tracing::info!(username = %req.username, "Login rejected: password mismatch");
        return Err(AuthError::InvalidCredentials);
    }

    let issued = state.tokens.issue(&principal, principal.token_email())?;

    if let Err(e) = state.credentials.record_login(&principal.username).await {
        tracing::warn!(username = %principal.username, error = %e, "Failed to record login");
    }

    tracing::info!(username = %principal.username, "Login succeeded");

    let body = SessionResponse {
        user: UserView::from(&principal),
        token: issued.token.clone(),
        expires_at: expiry_string(&issued),
    };
    Ok(with_bearer_header(&issued, Json(body)))
}

/// `POST /auth/refresh`
pub async fn refresh(
    State(state): State<Arc<ServiceState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Response, AuthError> {
    let token = req
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let email = req.email.as_deref().filter(|e| !e.trim().is_empty());
    let issued = state.tokens.refresh(token, email).map_err(|e| {
        tracing::info!(error = %e, "Refresh rejected");
        AuthError::from(e)
    })?;

    tracing::info!(subject = %issued.claims.sub, "Token refreshed");

    let body = TokenResponse {
        token: issued.token.clone(),
        expires_at: expiry_string(&issued),
    };
    Ok(with_bearer_header(&issued, Json(body)))
}

/// `GET /auth/check-token`
pub async fn check_token(
    State(state): State<Arc<ServiceState>>,
    RequireAuth(identity): RequireAuth,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AuthError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AuthError::Unauthenticated)?;

    let claims = state.tokens.parse(token)?;
    let principal = state
        .credentials
        .find_by_username(&identity.username)
        .await?
        .ok_or_else(|| AuthError::UserNotFound(identity.username.clone()))?;

    Ok(Json(SessionResponse {
        user: UserView::from(&principal),
        token: token.to_string(),
        expires_at: claims.expires_at().map(|t| t.to_rfc3339()),
    }))
}

/// `POST /auth/logout`
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout(RequireAuth(identity): RequireAuth) -> Json<MessageResponse> {
    tracing::info!(username = %identity.username, "Logout");
    Json(MessageResponse {
        message: "Logged out".to_string(),
    })
}

/// `GET /auth/me`
pub async fn me(RequireAuth(identity): RequireAuth) -> Json<Identity> {
    Json(identity)
}

/// `GET /auth/users/{username}`: admin-only account lookup.
pub async fn user(
    State(state): State<Arc<ServiceState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(username): Path<String>,
) -> Result<Json<UserView>, AuthError> {
    let principal = state
        .credentials
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AuthError::UserNotFound(username.clone()))?;

    tracing::debug!(admin = %admin.username, username = %username, "User lookup");
    Ok(Json(UserView::from(&principal)))
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn expiry_string(issued: &IssuedToken) -> Option<String> {
    issued.expires_at().map(|t| t.to_rfc3339())
}

fn with_bearer_header(issued: &IssuedToken, body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", issued.token)) {
        response.headers_mut().insert(AUTHORIZATION, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::{get, post},
    };
    use chrono::{Duration, Utc};
    use portero_token::Role;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ServiceConfig;
    use crate::password::hash_password;
    use crate::store::MemoryCredentialStore;

    fn alice() -> Principal {
        Principal {
            username: "alice".to_string(),
            password_hash: hash_password("wonderland").unwrap(),
            active: true,
            email: Some("alice@example.com".to_string()),
            roles: vec![Role::new("ROLE_USER")],
        }
    }

    fn state() -> Arc<ServiceState> {
        let mut dormant = alice();
        dormant.username = "dormant".to_string();
        dormant.active = false;
        let store = MemoryCredentialStore::with_principals([alice(), dormant]);
        Arc::new(ServiceState::new(ServiceConfig::default(), Arc::new(store)).unwrap())
    }

    fn app(state: Arc<ServiceState>) -> Router {
        Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .with_state(state)
    }

    fn json_post(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_login_success() {
        let state = state();
        let res = app(state.clone())
            .oneshot(json_post(
                "/auth/login",
                &serde_json::json!({"username": "alice", "password": "wonderland"}),
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let header = res
            .headers()
            .get(AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let body: SessionResponse = body_json(res).await;
        assert_eq!(header, format!("Bearer {}", body.token));
        assert_eq!(body.user.username, "alice");

        let claims = state.tokens.parse(&body.token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, vec!["ROLE_USER"]);
        assert_eq!(claims.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_login_rejections() {
        let app = app(state());
        for (username, password) in [
            ("alice", "wrong"),
            ("nobody", "wonderland"),
            ("dormant", "wonderland"),
        ] {
            let res = app
                .clone()
                .oneshot(json_post(
                    "/auth/login",
                    &serde_json::json!({"username": username, "password": password}),
                ))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{username}");
        }
    }

    #[tokio::test]
    async fn test_login_throttled_per_username() {
        let config = ServiceConfig {
            login_attempts_per_minute: 2,
            ..ServiceConfig::default()
        };
        let store = MemoryCredentialStore::with_principals([alice()]);
        let app = app(Arc::new(ServiceState::new(config, Arc::new(store)).unwrap()));

        let attempt = |password: &str| {
            json_post(
                "/auth/login",
                &serde_json::json!({"username": "alice", "password": password}),
            )
        };
        for _ in 0..2 {
            let res = app.clone().oneshot(attempt("wrong")).await.unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        }
        let res = app.oneshot(attempt("wonderland")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    struct SlowVerifier;

    impl crate::password::PasswordVerifier for SlowVerifier {
        fn matches(&self, _plaintext: &str, _hash: &str) -> bool {
            std::thread::sleep(std::time::Duration::from_millis(500));
            true
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_password_check_does_not_stall_other_requests() {
        let store = MemoryCredentialStore::with_principals([alice()]);
        let state = Arc::new(
            ServiceState::with_verifier(
                ServiceConfig::default(),
                Arc::new(store),
                Arc::new(SlowVerifier),
            )
            .unwrap(),
        );
        let app = app(state).route("/health", get(health));

        let started = std::time::Instant::now();
        let login = tokio::spawn(app.clone().oneshot(json_post(
            "/auth/login",
            &serde_json::json!({"username": "alice", "password": "anything"}),
        )));
        tokio::task::yield_now().await;

        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(started.elapsed() < std::time::Duration::from_millis(400));

        assert_eq!(login.await.unwrap().unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_expired_token() {
        let state = state();
        let old = state
            .tokens
            .issue_at(&alice(), "alice@example.com", Utc::now() - Duration::hours(2))
            .unwrap();

        let res = app(state.clone())
            .oneshot(json_post("/auth/refresh", &serde_json::json!({"token": old.token})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body: TokenResponse = body_json(res).await;
        let claims = state.tokens.parse(&body.token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, old.claims.roles);
        assert!(claims.exp > old.claims.exp);
    }

    #[tokio::test]
    async fn test_refresh_errors() {
        let app = app(state());

        let res = app
            .clone()
            .oneshot(json_post("/auth/refresh", &serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .oneshot(json_post("/auth/refresh", &serde_json::json!({"token": "a.b.c"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_requires_identity() {
        let app = Router::new().route("/auth/me", get(me));
        let res = app
            .oneshot(Request::builder().uri("/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
