//! Admin user management commands.

use std::path::PathBuf;

use portero_service::{ADMIN_AUTHORITY, UserRecord, UserStore, generate_password};

use crate::config::PorteroConfig;
use crate::ui;

/// Arguments for admin commands.
pub struct AdminArgs {
    /// The admin action to perform.
    pub action: AdminAction,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
    /// Config file override.
    pub config: Option<PathBuf>,
}

/// Admin actions.
pub enum AdminAction {
    /// Create a new user.
    Create {
        /// Login name.
        username: String,
        /// Password; prompted for when absent.
        password: Option<String>,
        /// Role names, `ROLE_` prefix optional.
        roles: Vec<String>,
        /// Email address.
        email: Option<String>,
        /// Generate a random password.
        generate_password: bool,
    },
    /// List all users.
    List,
    /// Reset a user's password.
    ResetPassword {
        /// Login name.
        username: String,
    },
    /// Enable a user account.
    Enable {
        /// Login name.
        username: String,
    },
    /// Disable a user account.
    Disable {
        /// Login name.
        username: String,
    },
    /// Delete a user.
    Delete {
        /// Login name.
        username: String,
        /// Skip the confirmation prompt.
        yes: bool,
    },
}

/// Run the admin command.
///
/// # Errors
///
/// Returns error if the operation fails.
pub fn run_admin(args: AdminArgs) -> anyhow::Result<()> {
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => PorteroConfig::resolve(args.config.as_deref())?
            .service
            .data_dir(),
    };

    std::fs::create_dir_all(&data_dir)?;

    let store = UserStore::open(&data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to open user store: {}", e))?;

    match args.action {
        AdminAction::Create {
            username,
            password,
            roles,
            email,
            generate_password: gen_pwd,
        } => create_user(&store, &username, password, &roles, email, gen_pwd)?,
        AdminAction::List => list_users(&store)?,
        AdminAction::ResetPassword { username } => reset_password(&store, &username)?,
        AdminAction::Enable { username } => set_user_active(&store, &username, true)?,
        AdminAction::Disable { username } => set_user_active(&store, &username, false)?,
        AdminAction::Delete { username, yes } => delete_user(&store, &username, yes)?,
    }

    Ok(())
}

fn create_user(
    store: &UserStore,
    username: &str,
    password: Option<String>,
    roles: &[String],
    email: Option<String>,
    gen_pwd: bool,
) -> anyhow::Result<()> {
    let password = if gen_pwd {
        let pwd = generate_password(16);
        ui::success(&format!("Generated password: {pwd}"));
        pwd
    } else if let Some(pwd) = password {
        pwd
    } else {
        ui::prompts::new_password(&format!("Password for '{username}'"))?
    };

    let user = UserRecord::new(username, &password, roles)
        .map_err(|e| anyhow::anyhow!("Failed to create user: {}", e))?
        .with_email(email);

    if user.roles.is_empty() {
        anyhow::bail!("At least one role is required");
    }

    store
        .create(&user)
        .map_err(|e| anyhow::anyhow!("Failed to save user: {}", e))?;

    ui::success(&format!(
        "Created user '{}' with roles '{}'",
        username,
        user.role_names()
    ));

    Ok(())
}

fn list_users(store: &UserStore) -> anyhow::Result<()> {
    let users = store
        .list()
        .map_err(|e| anyhow::anyhow!("Failed to list users: {}", e))?;

    if users.is_empty() {
        ui::info("No users configured.");
        ui::info("Run 'portero admin create --username admin --generate-password' to create an admin user.");
        return Ok(());
    }

    ui::info(&format!("Users ({}):", users.len()));
    println!();
    println!(
        "{:<20} {:<28} {:<8} {:<28} {:<20}",
        "USERNAME", "ROLES", "ACTIVE", "EMAIL", "LAST LOGIN"
    );
    println!("{}", "-".repeat(104));

    for user in users {
        let active = if user.active { "yes" } else { "no" };
        let last_login = user.last_login.map_or_else(
            || "never".to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        println!(
            "{:<20} {:<28} {:<8} {:<28} {:<20}",
            user.username,
            user.role_names(),
            active,
            user.email.as_deref().unwrap_or("-"),
            last_login
        );
    }

    Ok(())
}

fn find_user(store: &UserStore, username: &str) -> anyhow::Result<UserRecord> {
    store
        .get_by_username(username)
        .map_err(|e| anyhow::anyhow!("Failed to find user: {}", e))?
        .ok_or_else(|| anyhow::anyhow!("User not found: {}", username))
}

fn reset_password(store: &UserStore, username: &str) -> anyhow::Result<()> {
    let mut user = find_user(store, username)?;
    let new_password = generate_password(16);

    user.set_password(&new_password)
        .map_err(|e| anyhow::anyhow!("Failed to set password: {}", e))?;

    store
        .update(&user)
        .map_err(|e| anyhow::anyhow!("Failed to update user: {}", e))?;

    ui::success(&format!("Password reset for user '{username}'"));
    ui::success(&format!("New password: {new_password}"));

    Ok(())
}

fn set_user_active(store: &UserStore, username: &str, active: bool) -> anyhow::Result<()> {
    let mut user = find_user(store, username)?;

    if !active {
        ensure_other_admin(store, &user, "disable")?;
    }
    user.active = active;

    store
        .update(&user)
        .map_err(|e| anyhow::anyhow!("Failed to update user: {}", e))?;

    let status = if active { "enabled" } else { "disabled" };
    ui::success(&format!("User '{username}' {status}"));

    Ok(())
}

fn delete_user(store: &UserStore, username: &str, yes: bool) -> anyhow::Result<()> {
    let user = find_user(store, username)?;
    ensure_other_admin(store, &user, "delete")?;

    if !yes && !ui::prompts::confirm(&format!("Delete user '{username}'?"))? {
        ui::info("Delete cancelled");
        return Ok(());
    }

    store
        .delete(&user.id)
        .map_err(|e| anyhow::anyhow!("Failed to delete user: {}", e))?;

    ui::success(&format!("Deleted user '{username}'"));

    Ok(())
}

/// Refuse to remove the last active admin.
fn ensure_other_admin(store: &UserStore, user: &UserRecord, verb: &str) -> anyhow::Result<()> {
    if !(user.active && user.has_role(ADMIN_AUTHORITY)) {
        return Ok(());
    }

    let users = store
        .list()
        .map_err(|e| anyhow::anyhow!("Failed to list users: {}", e))?;
    let admin_count = users
        .iter()
        .filter(|u| u.active && u.has_role(ADMIN_AUTHORITY))
        .count();

    if admin_count <= 1 {
        anyhow::bail!("Cannot {verb} the last admin user");
    }
    Ok(())
}
