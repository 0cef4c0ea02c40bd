//! Token issuance, refresh and validation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::claims::ClaimSet;
use crate::codec::ClaimsCodec;
use crate::error::TokenError;
use crate::principal::Principal;

/// Default token lifetime (60 minutes).
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Longest accepted token lifetime (366 days).
pub const MAX_LIFETIME: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Compact JWS.
    pub token: String,
    /// Claims signed into `token`.
    pub claims: ClaimSet,
}

impl IssuedToken {
    /// Expiration timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims.expires_at()
    }
}

/// Issues and validates identity tokens.
///
/// Holds no per-token state: every operation is a pure function of the
/// token, the secret and the clock.
#[derive(Debug)]
pub struct TokenService {
    codec: ClaimsCodec,
    lifetime: Duration,
    chrono_lifetime: chrono::Duration,
}

impl TokenService {
    /// Create a token service from raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns `SecretTooWeak` if the secret is too short and
    /// `InvalidLifetime` if the lifetime is zero or above [`MAX_LIFETIME`].
    pub fn new(secret: &[u8], lifetime: Duration) -> Result<Self, TokenError> {
        Self::from_codec(ClaimsCodec::new(secret)?, lifetime)
    }

    /// Create a token service around an existing codec.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLifetime` if the lifetime is zero or above
    /// [`MAX_LIFETIME`].
    pub fn from_codec(codec: ClaimsCodec, lifetime: Duration) -> Result<Self, TokenError> {
        if lifetime.is_zero() || lifetime > MAX_LIFETIME {
            return Err(TokenError::InvalidLifetime(format!(
                "{}s, must be between 1s and {}s",
                lifetime.as_secs(),
                MAX_LIFETIME.as_secs()
            )));
        }
        let chrono_lifetime = chrono::Duration::from_std(lifetime)
            .map_err(|e| TokenError::InvalidLifetime(e.to_string()))?;

        Ok(Self {
            codec,
            lifetime,
            chrono_lifetime,
        })
    }

    /// Configured token lifetime.
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for `principal` carrying `email`.
    ///
    /// # Errors
    ///
    /// Returns error if signing fails.
    pub fn issue(&self, principal: &Principal, email: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(principal, email, Utc::now())
    }

    /// Issue a token with an explicit issue time.
    ///
    /// # Errors
    ///
    /// Returns error if signing fails.
    pub fn issue_at(
        &self,
        principal: &Principal,
        email: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let claims = ClaimSet::new(
            principal.username.clone(),
            principal.authorities(),
            email,
            issued_at,
            self.chrono_lifetime,
        );
        self.seal(claims)
    }

    /// Re-issue a token from a possibly expired one.
    ///
    /// Subject and roles are copied from the old claims; they are not
    /// re-read from the credential store, so a role change only takes
    /// effect at the next login. When `email` is `None` the old email is
    /// carried over.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` or `InvalidSignature` for a forged or broken token.
    pub fn refresh(&self, old_token: &str, email: Option<&str>) -> Result<IssuedToken, TokenError> {
        let old = self.codec.verify_ignoring_expiry(old_token)?;

        let username = old.continuity_username().to_string();
        let email = email.map_or_else(|| old.email.clone(), str::to_string);
        let mut claims = ClaimSet::new(
            old.sub,
            old.roles,
            email,
            Utc::now(),
            self.chrono_lifetime,
        );
        claims.username = username;

        tracing::debug!(subject = %claims.sub, "Refreshing token");
        self.seal(claims)
    }

    /// Strictly parse a token.
    ///
    /// # Errors
    ///
    /// Returns the codec error for invalid or expired tokens.
    pub fn parse(&self, token: &str) -> Result<ClaimSet, TokenError> {
        self.codec.verify(token)
    }

    /// Subject of a valid token, or `None` on any failure.
    #[must_use]
    pub fn extract_username(&self, token: &str) -> Option<String> {
        match self.codec.verify(token) {
            Ok(claims) => Some(claims.sub),
            Err(e) => {
                tracing::debug!(error = %e, "Could not extract username from token");
                None
            }
        }
    }

    /// Whether `token` is a valid, unexpired token for `principal`.
    #[must_use]
    pub fn is_valid(&self, token: &str, principal: &Principal) -> bool {
        self.codec
            .verify(token)
            .is_ok_and(|claims| claims.sub == principal.username)
    }

    fn seal(&self, claims: ClaimSet) -> Result<IssuedToken, TokenError> {
        let token = self.codec.sign(&claims)?;
        Ok(IssuedToken { token, claims })
    }
}
