//! # Portero Service
//!
//! Backend side of the Portero authentication layer.
//!
//! This crate provides:
//! - The validation filter that attaches an [`Identity`] to each request
//! - Endpoint extractors that reject requests lacking identity or authority
//! - Login, refresh, check-token and logout endpoints
//! - Credential stores (sled-backed and in-memory) and admin bootstrap

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Admin bootstrap from environment variables.
pub mod bootstrap;
mod config;
mod error;
/// Backend validation filter.
pub mod filter;
/// Authentication endpoints.
pub mod handlers;
mod identity;
mod limiter;
mod password;
mod server;
mod state;
/// Credential stores.
pub mod store;

pub use config::{DEFAULT_JWT_SECRET, MAX_TOKEN_LIFETIME_MINUTES, ServiceConfig};
pub use error::AuthError;
pub use identity::{ADMIN_AUTHORITY, Identity, OptionalAuth, RequireAdmin, RequireAuth};
pub use limiter::LoginRateLimiter;
pub use password::{Argon2Verifier, PasswordVerifier, generate_password, hash_password};
pub use server::{Service, router};
pub use state::ServiceState;
pub use store::{MemoryCredentialStore, UserRecord, UserStore};

/// Start the service.
///
/// # Errors
///
/// Returns error if the service fails to start.
pub async fn start(config: ServiceConfig) -> Result<(), ServiceError> {
    let service = Service::open(config)?;
    service.run().await
}

/// Service errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
