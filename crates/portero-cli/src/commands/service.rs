//! Service command - start the backend authentication service.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::PorteroConfig;
use crate::ui;

/// Service command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServiceArgs {
    /// Config file override.
    pub config: Option<PathBuf>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Bind address.
    pub bind: Option<String>,
    /// User database directory.
    pub data_dir: Option<PathBuf>,
}

/// Run the service until interrupted.
///
/// # Errors
///
/// Returns error if configuration is invalid or the service fails.
pub async fn run_service(args: ServiceArgs) -> Result<()> {
    let config = PorteroConfig::resolve(args.config.as_deref())?;
    if config.service.uses_default_secret() {
        ui::warning("service.jwtSecret is the shipped default");
    }

    let mut service_config = config.service;
    if let Some(port) = args.port {
        service_config.port = port;
    }
    if let Some(bind) = args.bind {
        service_config.bind_address = bind;
    }
    if args.data_dir.is_some() {
        service_config.data_dir = args.data_dir;
    }

    ui::header("Starting Portero Service");
    ui::kv(
        "Address",
        &format!("{}:{}", service_config.bind_address, service_config.port),
    );
    ui::kv("Data", &service_config.data_dir().display().to_string());
    ui::kv(
        "Token lifetime",
        &format!("{} min", service_config.token_lifetime_minutes),
    );
    println!();
    ui::info("Press Ctrl+C to stop");
    println!();

    portero_service::start(service_config).await?;

    Ok(())
}
