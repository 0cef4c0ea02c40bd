//! Token inspection.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use portero_token::{ClaimSet, ClaimsCodec};

use crate::config::PorteroConfig;
use crate::ui;

/// Token command arguments.
#[derive(Debug, Clone)]
pub struct TokenArgs {
    /// Config file override.
    pub config: Option<PathBuf>,
    /// Token to verify.
    pub token: String,
    /// Check the signature only.
    pub ignore_expiry: bool,
}

/// Verify a token against the service secret and print its claims.
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or the token does
/// not verify.
pub fn run_token(args: TokenArgs) -> Result<()> {
    let config = PorteroConfig::resolve(args.config.as_deref())?;
    let codec = ClaimsCodec::new(config.service.jwt_secret.as_bytes())?;

    let token = args.token.trim();
    let claims = if args.ignore_expiry {
        codec.verify_ignoring_expiry(token)?
    } else {
        codec.verify(token)?
    };

    ui::success("Signature valid");
    print_claims(&claims);
    if claims.is_expired() {
        ui::warning("Token is expired");
    }

    Ok(())
}

fn print_claims(claims: &ClaimSet) {
    ui::kv("Subject", &claims.sub);
    ui::kv("Roles", &claims.roles.join(", "));
    ui::kv("Email", &claims.email);
    ui::kv("Issued", &timestamp(claims.iat));
    ui::kv("Expires", &timestamp(claims.exp));
    if let Some(jti) = &claims.jti {
        ui::kv("Token ID", jti);
    }
}

fn timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map_or_else(|| secs.to_string(), |t| t.to_rfc3339())
}
