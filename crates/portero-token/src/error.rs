//! Token and credential lookup errors.

use thiserror::Error;

use crate::codec::MIN_SECRET_LEN;

/// Errors raised while signing or verifying tokens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The signing secret is shorter than [`MIN_SECRET_LEN`] bytes.
    #[error("Signing secret too weak: {0} bytes, need at least {MIN_SECRET_LEN}")]
    SecretTooWeak(usize),

    /// The token is not three base64url segments or a segment does not decode.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The signature does not match the header and payload.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The token is past its `exp` claim.
    #[error("Token expired")]
    Expired,

    /// The token lifetime is zero or too long to represent.
    #[error("Invalid token lifetime: {0}")]
    InvalidLifetime(String),

    /// The claim set could not be serialized or signed.
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

impl TokenError {
    /// Whether this error is caused by the server configuration rather than
    /// by the token presented.
    #[must_use]
    pub const fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::SecretTooWeak(_) | Self::InvalidLifetime(_) | Self::Encoding(_)
        )
    }
}

/// Failure reported by a credential store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Credential store error: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Create a new store error from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}
