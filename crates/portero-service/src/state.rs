//! Shared service state.

use std::sync::Arc;

use portero_token::{CredentialStore, TokenService};
use secrecy::ExposeSecret;

use crate::config::ServiceConfig;
use crate::error::AuthError;
use crate::limiter::LoginRateLimiter;
use crate::password::{Argon2Verifier, PasswordVerifier};

/// State shared by the validation filter and the auth endpoints.
///
/// Built once at start-up and never mutated afterwards.
pub struct ServiceState {
    /// Service configuration.
    pub config: ServiceConfig,
    /// Token issuance and validation.
    pub tokens: TokenService,
    /// Principal lookup.
    pub credentials: Arc<dyn CredentialStore>,
    /// Password verification.
    pub passwords: Arc<dyn PasswordVerifier>,
    /// Login attempt throttling.
    pub login_limiter: LoginRateLimiter,
}

impl ServiceState {
    /// Build state from configuration and a credential store, using Argon2
    /// for password checks.
    ///
    /// # Errors
    ///
    /// Returns error if the signing secret is too weak.
    pub fn new(
        config: ServiceConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, AuthError> {
        Self::with_verifier(config, credentials, Arc::new(Argon2Verifier))
    }

    /// Build state with an explicit password verifier.
    ///
    /// # Errors
    ///
    /// Returns error if the signing secret is too weak.
    pub fn with_verifier(
        config: ServiceConfig,
        credentials: Arc<dyn CredentialStore>,
        passwords: Arc<dyn PasswordVerifier>,
    ) -> Result<Self, AuthError> {
        if config.uses_default_secret() {
            tracing::warn!("Service is using the default JWT secret; set jwtSecret before deploying");
        }

        let secret = config.signing_secret();
        let tokens = TokenService::new(secret.expose_secret().as_bytes(), config.token_lifetime())?;

        let login_limiter = LoginRateLimiter::new(config.login_attempts_per_minute);

        Ok(Self {
            config,
            tokens,
            credentials,
            passwords,
            login_limiter,
        })
    }
}

impl std::fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceState")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
