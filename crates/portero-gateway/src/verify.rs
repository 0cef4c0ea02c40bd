//! Token verification at the edge.
//!
//! Independent of the service-side codec: the gateway reads claims as an
//! untyped JSON map so that the role and email claim names stay
//! configurable.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};

/// Verified token claims.
pub type Claims = Map<String, Value>;

/// Verification failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    /// Signature valid but `exp` has passed.
    Expired,
    /// Malformed token or bad signature.
    Invalid(String),
}

/// HS256 verifier with strict expiry.
pub struct EdgeVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl EdgeVerifier {
    /// Create a verifier for `secret`.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify `token` and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `Expired` or `Invalid`.
    pub fn verify(&self, token: &str) -> Result<Claims, VerifyFailure> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyFailure::Expired,
                _ => VerifyFailure::Invalid(e.to_string()),
            })
    }
}

impl std::fmt::Debug for EdgeVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeVerifier").finish_non_exhaustive()
    }
}

/// Non-empty string claim.
#[must_use]
pub fn string_claim<'a>(claims: &'a Claims, name: &str) -> Option<&'a str> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Role values from a claim holding either a comma-separated string or an
/// array of strings. Entries are trimmed, empties dropped, duplicates
/// removed keeping first occurrence.
#[must_use]
pub fn list_claim(claims: &Claims, name: &str) -> Vec<String> {
    let raw: Vec<&str> = match claims.get(name) {
        Some(Value::String(s)) => s.split(',').collect(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    let mut out: Vec<String> = Vec::new();
    for value in raw.into_iter().map(str::trim).filter(|v| !v.is_empty()) {
        if !out.iter().any(|o| o == value) {
            out.push(value.to_string());
        }
    }
    out
}
