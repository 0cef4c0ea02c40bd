//! Gateway command - start the edge gateway.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::PorteroConfig;
use crate::ui;

/// Gateway command arguments.
#[derive(Debug, Clone, Default)]
pub struct GatewayArgs {
    /// Config file override.
    pub config: Option<PathBuf>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Bind address.
    pub bind: Option<String>,
}

/// Run the gateway until interrupted.
///
/// # Errors
///
/// Returns error if configuration is invalid or the gateway fails.
pub async fn run_gateway(args: GatewayArgs) -> Result<()> {
    let config = PorteroConfig::resolve(args.config.as_deref())?;
    for warning in config.warnings() {
        ui::warning(&warning);
    }

    let mut gateway_config = config.gateway;
    if let Some(port) = args.port {
        gateway_config.port = port;
    }
    if let Some(bind) = args.bind {
        gateway_config.bind_address = bind;
    }

    ui::header("Starting Portero Gateway");
    ui::kv(
        "Address",
        &format!("{}:{}", gateway_config.bind_address, gateway_config.port),
    );
    ui::kv("Protected", &gateway_config.filter.protected_path);
    ui::kv("Allowed roles", &gateway_config.filter.allowed_roles.join(", "));
    for route in &gateway_config.routes {
        ui::kv("Route", &format!("{} -> {}", route.path_prefix, route.upstream));
    }
    println!();
    ui::info("Press Ctrl+C to stop");
    println!();

    portero_gateway::start(gateway_config).await?;

    Ok(())
}
