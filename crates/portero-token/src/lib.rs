//! # Portero Token
//!
//! Signed identity tokens shared by the Portero login endpoint and the
//! backend validation filter.
//!
//! - [`ClaimsCodec`]: HS256 signing and verification of a [`ClaimSet`]
//! - [`TokenService`]: issue, refresh and validate tokens for a [`Principal`]
//! - [`CredentialStore`]: the lookup seam the service crate plugs stores into

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod claims;
mod codec;
mod error;
mod principal;
mod service;

pub use claims::{ClaimSet, generate_token_id};
pub use codec::{ClaimsCodec, MIN_SECRET_LEN, sign, verify};
pub use error::{StoreError, TokenError};
pub use principal::{CredentialStore, Principal, Role, ROLE_PREFIX, normalize_authorities};
pub use service::{DEFAULT_LIFETIME, IssuedToken, MAX_LIFETIME, TokenService};

/// Extract the token from an `Authorization` header value.
///
/// Expects format: "Bearer <token>". Returns `None` for any other scheme
/// or for an empty token.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("abc.def.ghi"), None);
    }
}
