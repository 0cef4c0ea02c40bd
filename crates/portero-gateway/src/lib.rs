//! # Portero Gateway
//!
//! Edge side of the Portero authentication layer.
//!
//! This crate provides:
//! - The edge filter that verifies bearer tokens on the protected prefix
//! - Identity header injection (`X-Usuario`, `X-Roles`, `X-Email`, `X-JWT-ID`)
//! - A prefix-routed reverse proxy to upstream services
//!
//! The gateway verifies tokens on its own; it does not call the service.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
/// Edge filter and identity headers.
pub mod filter;
/// Upstream routing.
pub mod proxy;
mod server;
mod verify;

pub use config::{DEFAULT_JWT_SECRET, EdgeFilterConfig, GatewayConfig, RouteConfig, split_list};
pub use error::{EdgeRejection, ProxyError};
pub use filter::{Decision, EdgeFilter, IdentityHeaders, PassReason, VerifiedSubject};
pub use server::{ACCESS_LOG_ORDER, Gateway};
pub use verify::{Claims, EdgeVerifier, VerifyFailure};

/// Start the gateway.
///
/// # Errors
///
/// Returns error if the gateway fails to start.
pub async fn start(config: GatewayConfig) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
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
