//! Principals, roles and the credential lookup seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Prefix carried by every authority name.
pub const ROLE_PREFIX: &str = "ROLE_";

/// A named role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role name, unique.
    pub name: String,
    /// Whether the role is active. Not re-checked once a token is issued.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Role {
    /// Create an active role.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
        }
    }
}

/// An authenticatable identity as seen by the token layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique username.
    pub username: String,
    /// Argon2 PHC hash of the password.
    pub password_hash: String,
    /// Whether the account may authenticate.
    pub active: bool,
    /// Email address, if known.
    #[serde(default)]
    pub email: Option<String>,
    /// Assigned roles.
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Principal {
    /// Normalized authority names for this principal.
    ///
    /// Every assigned role is included regardless of its `active` flag.
    #[must_use]
    pub fn authorities(&self) -> Vec<String> {
        normalize_authorities(self.roles.iter().map(|r| r.name.as_str()))
    }

    /// Email to embed in tokens, falling back to the username.
    #[must_use]
    pub fn token_email(&self) -> &str {
        self.email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

/// Normalize role names into authority names.
///
/// Blank names are dropped, names are trimmed and `ROLE_` prefixed when the
/// prefix is missing, duplicates are removed keeping first occurrence order.
pub fn normalize_authorities<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        let authority = if name.starts_with(ROLE_PREFIX) {
            name.to_string()
        } else {
            format!("{ROLE_PREFIX}{name}")
        };
        if !out.contains(&authority) {
            out.push(authority);
        }
    }
    out
}

/// Looks up principals by username.
///
/// Implementations must be safe to share across request tasks.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a principal by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, StoreError>;

    /// Record a successful login. The default does nothing.
    async fn record_login(&self, _username: &str) -> Result<(), StoreError> {
        Ok(())
    }
}
