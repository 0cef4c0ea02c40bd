//! Seed the first administrator on an empty user store.

use crate::error::AuthError;
use crate::identity::ADMIN_AUTHORITY;
use crate::store::{UserRecord, UserStore};

/// Create an admin from `PORTERO_ADMIN_USERNAME` / `PORTERO_ADMIN_PASSWORD`
/// (and optional `PORTERO_ADMIN_EMAIL`) if no users exist yet.
///
/// # Errors
///
/// Returns error if user creation fails.
pub fn auto_setup_from_env(store: &UserStore) -> Result<Option<UserRecord>, AuthError> {
    bootstrap_admin(store, |key| std::env::var(key).ok())
}

/// Same as [`auto_setup_from_env`] with an explicit variable lookup.
///
/// # Errors
///
/// Returns error if user creation fails.
pub fn bootstrap_admin(
    store: &UserStore,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<UserRecord>, AuthError> {
    if !store.is_empty() {
        return Ok(None);
    }

    let Some(username) = lookup("PORTERO_ADMIN_USERNAME").filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let Some(password) = lookup("PORTERO_ADMIN_PASSWORD").filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    let admin = UserRecord::new(username, &password, [ADMIN_AUTHORITY])?
        .with_email(lookup("PORTERO_ADMIN_EMAIL"));
    store.create(&admin)?;

    tracing::info!(
        username = %admin.username,
        "Admin user created from environment variables"
    );

    Ok(Some(admin))
}
