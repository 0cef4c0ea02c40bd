//! Portero CLI - run the gateway and service, manage users and tokens.

mod commands;
mod config;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{LogFormat, PorteroConfig, Settings};

#[derive(Parser)]
#[command(name = "portero")]
#[command(about = "Portero - JWT edge gateway and authentication service")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.portero/portero.json)
    #[arg(long, global = true, env = "PORTERO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Edge gateway operations
    Gateway {
        #[command(subcommand)]
        action: ServerCommands,
    },

    /// Backend service operations
    Service {
        #[command(subcommand)]
        action: ServiceCommands,
    },

    /// User management (admin commands)
    Admin {
        #[command(subcommand)]
        action: AdminCommands,

        /// Data directory override
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
    },

    /// Signing secret utilities
    Secret {
        #[command(subcommand)]
        action: SecretCommands,
    },

    /// Token utilities
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// Configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Start the gateway
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Subcommand)]
enum ServiceCommands {
    /// Start the service
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// User database directory
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create a new user
    Create {
        /// Username for the new user
        #[arg(long)]
        username: String,

        /// Password (prompted for if omitted)
        #[arg(long)]
        password: Option<String>,

        /// Role, repeatable; ROLE_ prefix optional
        #[arg(long = "role", default_value = "ROLE_ADMIN")]
        roles: Vec<String>,

        /// Email address carried in issued tokens
        #[arg(long)]
        email: Option<String>,

        /// Generate a random password
        #[arg(long, conflicts_with = "password")]
        generate_password: bool,
    },

    /// List all users
    List,

    /// Reset a user's password
    ResetPassword {
        /// Username of the user
        #[arg(long)]
        username: String,
    },

    /// Enable a user account
    Enable {
        /// Username of the user
        #[arg(long)]
        username: String,
    },

    /// Disable a user account
    Disable {
        /// Username of the user
        #[arg(long)]
        username: String,
    },

    /// Delete a user
    Delete {
        /// Username of the user to delete
        #[arg(long)]
        username: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Print a new random signing secret
    Generate,
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Verify a token with the service secret and print its claims
    Verify {
        /// The token
        token: String,

        /// Check the signature only
        #[arg(long)]
        ignore_expiry: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Validate configuration
    Validate,
}

fn init_logging(verbose: bool, settings: &Settings) {
    let filter = if verbose || settings.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    match settings.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Settings only; commands load and report config errors themselves
    let settings = PorteroConfig::resolve(cli.config.as_deref())
        .map(|c| c.settings)
        .unwrap_or_default();
    init_logging(cli.verbose, &settings);

    let Some(command) = cli.command else {
        ui::banner();
        ui::info("Run 'portero service run' and 'portero gateway run' to start, or 'portero --help' for all commands.");
        return Ok(());
    };

    match command {
        Commands::Gateway {
            action: ServerCommands::Run { port, bind },
        } => {
            let args = commands::gateway::GatewayArgs {
                config: cli.config,
                port,
                bind,
            };
            commands::run_gateway(args).await?;
        }

        Commands::Service {
            action: ServiceCommands::Run {
                port,
                bind,
                data_dir,
            },
        } => {
            let args = commands::service::ServiceArgs {
                config: cli.config,
                port,
                bind,
                data_dir,
            };
            commands::run_service(args).await?;
        }

        Commands::Admin { action, data_dir } => {
            let args = commands::admin::AdminArgs {
                action: match action {
                    AdminCommands::Create {
                        username,
                        password,
                        roles,
                        email,
                        generate_password,
                    } => commands::admin::AdminAction::Create {
                        username,
                        password,
                        roles,
                        email,
                        generate_password,
                    },
                    AdminCommands::List => commands::admin::AdminAction::List,
                    AdminCommands::ResetPassword { username } => {
                        commands::admin::AdminAction::ResetPassword { username }
                    }
                    AdminCommands::Enable { username } => {
                        commands::admin::AdminAction::Enable { username }
                    }
                    AdminCommands::Disable { username } => {
                        commands::admin::AdminAction::Disable { username }
                    }
                    AdminCommands::Delete { username, yes } => {
                        commands::admin::AdminAction::Delete { username, yes }
                    }
                },
                data_dir,
                config: cli.config,
            };
            commands::run_admin(args)?;
        }

        Commands::Secret {
            action: SecretCommands::Generate,
        } => commands::run_secret(),

        Commands::Token {
            action:
                TokenCommands::Verify {
                    token,
                    ignore_expiry,
                },
        } => {
            let args = commands::token::TokenArgs {
                config: cli.config,
                token,
                ignore_expiry,
            };
            commands::run_token(args)?;
        }

        Commands::Config { action } => {
            let args = commands::config::ConfigArgs {
                config: cli.config,
                validate: matches!(action, Some(ConfigCommands::Validate)),
            };
            commands::run_config(args)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_admin_create_roles() {
        let cli = Cli::try_parse_from([
            "portero", "admin", "create", "--username", "alice", "--role", "user", "--role",
            "auditor", "--generate-password",
        ])
        .unwrap();

        let Some(Commands::Admin {
            action: AdminCommands::Create { roles, .. },
            ..
        }) = cli.command
        else {
            panic!("expected admin create");
        };
        assert_eq!(roles, vec!["user", "auditor"]);
    }

    #[test]
    fn test_token_verify_flags() {
        let cli =
            Cli::try_parse_from(["portero", "token", "verify", "abc.def.ghi", "--ignore-expiry"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Token {
                action: TokenCommands::Verify {
                    ignore_expiry: true,
                    ..
                }
            })
        ));
    }
}
