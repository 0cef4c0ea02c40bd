//! User records persisted in sled.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portero_token::{CredentialStore, Principal, Role, StoreError, normalize_authorities};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::password::{Argon2Verifier, PasswordVerifier, hash_password};

const USERNAME_INDEX: &str = "idx:username:";

/// Persisted user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique record ID.
    pub id: String,
    /// Username for login.
    pub username: String,
    /// Optional email address.
    pub email: Option<String>,
    /// Argon2 password hash.
    pub password_hash: String,
    /// Assigned roles.
    pub roles: Vec<Role>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user last logged in.
    pub last_login: Option<DateTime<Utc>>,
    /// Whether the account is active.
    pub active: bool,
}

impl UserRecord {
    /// Create a new active user. Role names are normalized to authorities.
    ///
    /// # Errors
    ///
    /// Returns error if password hashing fails.
    pub fn new<I, S>(username: impl Into<String>, password: &str, roles: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            id: format!("user_{}", portero_token::generate_token_id()),
            username: username.into(),
            email: None,
            password_hash: hash_password(password)?,
            roles: normalize_authorities(roles).into_iter().map(Role::new).collect(),
            created_at: Utc::now(),
            last_login: None,
            active: true,
        })
    }

    /// Set the email address.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email.filter(|e| !e.trim().is_empty());
        self
    }

    /// Whether `password` matches the stored hash.
    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        Argon2Verifier.matches(password, &self.password_hash)
    }

    /// Update the user's password.
    ///
    /// # Errors
    ///
    /// Returns error if password hashing fails.
    pub fn set_password(&mut self, password: &str) -> Result<(), AuthError> {
        self.password_hash = hash_password(password)?;
        Ok(())
    }

    /// Whether the user holds `authority`.
    #[must_use]
    pub fn has_role(&self, authority: &str) -> bool {
        self.roles.iter().any(|r| r.name == authority)
    }

    /// Comma-separated role names, for display.
    #[must_use]
    pub fn role_names(&self) -> String {
        self.roles
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// View of this record as a token-layer principal.
    #[must_use]
    pub fn to_principal(&self) -> Principal {
        Principal {
            username: self.username.clone(),
            password_hash: self.password_hash.clone(),
            active: self.active,
            email: self.email.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// User store backed by sled.
///
/// Records are keyed by ID with a secondary `idx:username:` index.
pub struct UserStore {
    tree: sled::Tree,
}

impl UserStore {
    /// Open or create a user store under `path`.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, AuthError> {
        let db = sled::open(path.join("users"))
            .map_err(|e| AuthError::Storage(format!("Failed to open user database: {e}")))?;
        Self::with_db(&db)
    }

    /// Create a user store inside an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if tree cannot be opened.
    pub fn with_db(db: &sled::Db) -> Result<Self, AuthError> {
        let tree = db
            .open_tree("users")
            .map_err(|e| AuthError::Storage(format!("Failed to open users tree: {e}")))?;
        Ok(Self { tree })
    }

    /// Check if any users exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Count total users.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tree
            .iter()
            .filter(|r| {
                r.as_ref()
                    .is_ok_and(|(k, _)| !k.starts_with(USERNAME_INDEX.as_bytes()))
            })
            .count()
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns error if the username is taken or storage fails.
    pub fn create(&self, user: &UserRecord) -> Result<(), AuthError> {
        if self.get_by_username(&user.username)?.is_some() {
            return Err(AuthError::UserExists(user.username.clone()));
        }

        self.write_record(user)?;

        let index_key = format!("{USERNAME_INDEX}{}", user.username);
        self.tree
            .insert(index_key.as_bytes(), user.id.as_bytes())
            .map_err(|e| AuthError::Storage(format!("Index error: {e}")))?;

        self.flush()
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: &str) -> Result<Option<UserRecord>, AuthError> {
        self.tree
            .get(id.as_bytes())
            .map_err(|e| AuthError::Storage(format!("Get error: {e}")))?
            .map(|value| {
                serde_json::from_slice(&value)
                    .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))
            })
            .transpose()
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        let index_key = format!("{USERNAME_INDEX}{username}");
        match self.tree.get(index_key.as_bytes()) {
            Ok(Some(id_bytes)) => self.get(&String::from_utf8_lossy(&id_bytes)),
            Ok(None) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Index lookup error: {e}"))),
        }
    }

    /// Update an existing user.
    ///
    /// # Errors
    ///
    /// Returns error if the user doesn't exist or storage fails.
    pub fn update(&self, user: &UserRecord) -> Result<(), AuthError> {
        if self.get(&user.id)?.is_none() {
            return Err(AuthError::UserNotFound(user.username.clone()));
        }

        self.write_record(user)?;
        self.flush()
    }

    /// Delete a user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete(&self, id: &str) -> Result<bool, AuthError> {
        if let Some(user) = self.get(id)? {
            let index_key = format!("{USERNAME_INDEX}{}", user.username);
            self.tree
                .remove(index_key.as_bytes())
                .map_err(|e| AuthError::Storage(format!("Index remove error: {e}")))?;
        }

        let removed = self
            .tree
            .remove(id.as_bytes())
            .map_err(|e| AuthError::Storage(format!("Delete error: {e}")))?
            .is_some();

        self.flush()?;
        Ok(removed)
    }

    /// List all users.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<UserRecord>, AuthError> {
        let mut users = Vec::new();

        for result in self.tree.iter() {
            let (key, value) = result.map_err(|e| AuthError::Storage(format!("Iter error: {e}")))?;
            if key.starts_with(USERNAME_INDEX.as_bytes()) {
                continue;
            }

            let user: UserRecord = serde_json::from_slice(&value)
                .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))?;
            users.push(user);
        }

        Ok(users)
    }

    /// Record a login for `username`.
    ///
    /// # Errors
    ///
    /// Returns error if the user doesn't exist or storage fails.
    pub fn update_last_login(&self, username: &str) -> Result<(), AuthError> {
        let mut user = self
            .get_by_username(username)?
            .ok_or_else(|| AuthError::UserNotFound(username.to_string()))?;

        user.last_login = Some(Utc::now());
        self.update(&user)
    }

    fn write_record(&self, user: &UserRecord) -> Result<(), AuthError> {
        let value = serde_json::to_vec(user)
            .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))?;

        self.tree
            .insert(user.id.as_bytes(), value)
            .map_err(|e| AuthError::Storage(format!("Insert error: {e}")))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), AuthError> {
        self.tree
            .flush()
            .map(|_| ())
            .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))
    }
}

impl std::fmt::Debug for UserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStore")
            .field("user_count", &self.count())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for UserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, StoreError> {
        self.get_by_username(username)
            .map(|user| user.map(|u| u.to_principal()))
            .map_err(StoreError::new)
    }

    async fn record_login(&self, username: &str) -> Result<(), StoreError> {
        self.update_last_login(username).map_err(StoreError::new)
    }
}
