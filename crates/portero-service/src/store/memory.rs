//! In-memory credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use portero_token::{CredentialStore, Principal, StoreError};
use tokio::sync::RwLock;

/// Credential store held entirely in memory. Used for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    principals: RwLock<HashMap<String, Principal>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `principals`.
    #[must_use]
    pub fn with_principals(principals: impl IntoIterator<Item = Principal>) -> Self {
        let map = principals
            .into_iter()
            .map(|p| (p.username.clone(), p))
            .collect();
        Self {
            principals: RwLock::new(map),
        }
    }

    /// Insert or replace a principal.
    pub async fn insert(&self, principal: Principal) {
        self.principals
            .write()
            .await
            .insert(principal.username.clone(), principal);
    }

    /// Remove a principal, returning it if present.
    pub async fn remove(&self, username: &str) -> Option<Principal> {
        self.principals.write().await.remove(username)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self.principals.read().await.get(username).cloned())
    }
}
