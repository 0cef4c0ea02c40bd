//! Gateway configuration.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Secret shipped as the default. Deployments must override it.
pub const DEFAULT_JWT_SECRET: &str = "SuperClaveSecretaSeguraQueDebesCambiar";

/// Edge filter settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeFilterConfig {
    /// Shared HS256 signing secret (raw UTF-8 bytes).
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Path prefix that requires a token.
    #[serde(default = "default_protected_path")]
    pub protected_path: String,

    /// Role names allowed through the protected prefix.
    #[serde(default = "default_allowed_roles")]
    pub allowed_roles: Vec<String>,

    /// Name of the claim carrying roles.
    #[serde(default = "default_role_claim")]
    pub role_claim: String,

    /// Name of the claim carrying the email.
    #[serde(default = "default_email_claim")]
    pub email_claim: String,

    /// Position of the edge filter in the gateway chain. Lower runs first;
    /// the access log sits at `0`.
    #[serde(default = "default_order")]
    pub order: i32,

    /// Path fragments that bypass the filter when contained anywhere in the
    /// request path.
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_protected_path() -> String {
    "/api/segura/".to_string()
}

fn default_allowed_roles() -> Vec<String> {
    vec!["ROLE_ADMIN".to_string(), "ROLE_USER".to_string()]
}

fn default_role_claim() -> String {
    "roles".to_string()
}

fn default_email_claim() -> String {
    "email".to_string()
}

fn default_order() -> i32 {
    100
}

fn default_exempt_paths() -> Vec<String> {
    [
        "/login",
        "/register",
        "/public/",
        "/swagger-ui/",
        "/v3/api-docs/",
        "/auth/login",
        "/usuarios/register",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for EdgeFilterConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            protected_path: default_protected_path(),
            allowed_roles: default_allowed_roles(),
            role_claim: default_role_claim(),
            email_claim: default_email_claim(),
            order: default_order(),
            exempt_paths: default_exempt_paths(),
        }
    }
}

impl EdgeFilterConfig {
    /// The signing secret, wrapped so it stays out of logs.
    #[must_use]
    pub fn signing_secret(&self) -> SecretString {
        SecretString::from(self.jwt_secret.clone())
    }

    /// Whether the signing secret is still the shipped default.
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// List values are comma separated.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secret) = lookup("PORTERO_GATEWAY_JWT_SECRET").filter(|s| !s.is_empty()) {
            self.jwt_secret = secret;
        }
        if let Some(path) = lookup("PORTERO_GATEWAY_PROTECTED_PATH").filter(|s| !s.is_empty()) {
            self.protected_path = path;
        }
        if let Some(roles) = lookup("PORTERO_GATEWAY_ALLOWED_ROLES") {
            self.allowed_roles = split_list(&roles);
        }
        self
    }
}

impl std::fmt::Debug for EdgeFilterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeFilterConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("protected_path", &self.protected_path)
            .field("allowed_roles", &self.allowed_roles)
            .field("role_claim", &self.role_claim)
            .field("email_claim", &self.email_claim)
            .field("order", &self.order)
            .field("exempt_paths", &self.exempt_paths)
            .finish()
    }
}

/// One upstream route: requests whose path starts with `pathPrefix` go to
/// `upstream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Path prefix to match.
    pub path_prefix: String,
    /// Upstream base URL, e.g. `http://127.0.0.1:8080`.
    pub upstream: String,
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Enable permissive CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Per-request timeout in seconds, including the upstream call.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Largest request body forwarded upstream, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Edge filter settings.
    #[serde(flatten)]
    pub filter: EdgeFilterConfig,

    /// Upstream routes.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

fn default_port() -> u16 {
    8000
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            cors: default_true(),
            timeout_secs: default_timeout(),
            max_body_bytes: default_max_body_bytes(),
            filter: EdgeFilterConfig::default(),
            routes: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Request timeout as Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.filter = self.filter.with_overrides_from(lookup);
        self
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
