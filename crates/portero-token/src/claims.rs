//! Claim set carried inside every issued token.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Claims embedded in a signed token.
///
/// Serialized as a flat JSON object. Once signed a claim set is never
/// mutated; refresh produces a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Subject (the principal's unique username).
    pub sub: String,
    /// Role names, `ROLE_` prefixed.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Email address of the principal.
    #[serde(default)]
    pub email: String,
    /// Username, duplicated from `sub` for refresh continuity.
    #[serde(default)]
    pub username: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Random token id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl ClaimSet {
    /// Build a claim set issued at `issued_at` that lives for `lifetime`.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        roles: Vec<String>,
        email: impl Into<String>,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        let subject = subject.into();
        let iat = issued_at.timestamp();
        Self {
            username: subject.clone(),
            sub: subject,
            roles,
            email: email.into(),
            iat,
            exp: iat + lifetime.num_seconds(),
            jti: Some(generate_token_id()),
        }
    }

    /// Whether the claim set is expired at `now` (Unix seconds).
    ///
    /// A token is still valid during the second equal to `exp`.
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        now > self.exp
    }

    /// Whether the claim set is expired right now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Username to carry forward on refresh, falling back to the subject.
    #[must_use]
    pub fn continuity_username(&self) -> &str {
        if self.username.is_empty() {
            &self.sub
        } else {
            &self.username
        }
    }
}

/// Generate a random 128-bit token id as hex.
#[must_use]
pub fn generate_token_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
