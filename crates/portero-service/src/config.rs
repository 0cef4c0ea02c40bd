//! Backend service configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Secret shipped as the default on both the gateway and the service.
/// Deployments must override it.
pub const DEFAULT_JWT_SECRET: &str = "SuperClaveSecretaSeguraQueDebesCambiar";

/// Default token lifetime in minutes.
const DEFAULT_TOKEN_LIFETIME_MINUTES: u64 = 60;

/// Longest accepted token lifetime in minutes (366 days).
pub const MAX_TOKEN_LIFETIME_MINUTES: u64 = 366 * 24 * 60;

/// Backend service configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Enable permissive CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Shared HS256 signing secret (raw UTF-8 bytes).
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Token lifetime in minutes.
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_minutes: u64,

    /// Paths that bypass the validation filter when matched exactly.
    #[serde(default = "default_exempt_exact")]
    pub exempt_exact: Vec<String>,

    /// Path prefixes that bypass the validation filter.
    #[serde(default = "default_exempt_prefixes")]
    pub exempt_prefixes: Vec<String>,

    /// Login attempts allowed per username per minute.
    #[serde(default = "default_login_attempts")]
    pub login_attempts_per_minute: u32,

    /// Directory holding the user database.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_port() -> u16 {
    8080
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

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_token_lifetime() -> u64 {
    DEFAULT_TOKEN_LIFETIME_MINUTES
}

fn default_login_attempts() -> u32 {
    10
}

fn default_exempt_exact() -> Vec<String> {
    vec![
        "/auth/login".to_string(),
        "/auth/refresh".to_string(),
        "/usuarios/register".to_string(),
    ]
}

fn default_exempt_prefixes() -> Vec<String> {
    vec!["/swagger-ui".to_string(), "/v3/api-docs".to_string()]
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            cors: default_true(),
            timeout_secs: default_timeout(),
            jwt_secret: default_jwt_secret(),
            token_lifetime_minutes: default_token_lifetime(),
            exempt_exact: default_exempt_exact(),
            exempt_prefixes: default_exempt_prefixes(),
            login_attempts_per_minute: default_login_attempts(),
            data_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Token lifetime as Duration. Saturates instead of overflowing; the
    /// token service rejects anything above its maximum.
    #[must_use]
    pub const fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_minutes.saturating_mul(60))
    }

    /// Check values that would make the service unusable.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first bad field.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_TOKEN_LIFETIME_MINUTES).contains(&self.token_lifetime_minutes) {
            return Err(format!(
                "tokenLifetimeMinutes must be between 1 and {MAX_TOKEN_LIFETIME_MINUTES}, got {}",
                self.token_lifetime_minutes
            ));
        }
        if self.port == 0 {
            return Err("Service port cannot be 0".to_string());
        }
        Ok(())
    }

    /// Request timeout as Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

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

    /// Resolved data directory for the user database.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("portero")
                .join("service")
        })
    }

    /// Whether `path` bypasses the validation filter.
    #[must_use]
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_exact.iter().any(|p| p == path)
            || self.exempt_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secret) = lookup("PORTERO_SERVICE_JWT_SECRET").filter(|s| !s.is_empty()) {
            self.jwt_secret = secret;
        }

        if let Some(minutes) =
            lookup("PORTERO_TOKEN_LIFETIME_MINUTES").and_then(|v| v.trim().parse().ok())
        {
            self.token_lifetime_minutes = minutes;
        }

        self
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("port", &self.port)
            .field("bind_address", &self.bind_address)
            .field("cors", &self.cors)
            .field("timeout_secs", &self.timeout_secs)
            .field("jwt_secret", &"[REDACTED]")
            .field("token_lifetime_minutes", &self.token_lifetime_minutes)
            .field("exempt_exact", &self.exempt_exact)
            .field("exempt_prefixes", &self.exempt_prefixes)
            .field("login_attempts_per_minute", &self.login_attempts_per_minute)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}
