//! Config show/validate command.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::PorteroConfig;
use crate::ui;

/// Config command arguments.
#[derive(Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file override.
    pub config: Option<PathBuf>,
    /// Validate instead of printing.
    pub validate: bool,
}

/// Run the config command.
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or printed.
pub fn run_config(args: ConfigArgs) -> Result<()> {
    if args.validate {
        return validate_config(args.config);
    }
    show_config(args.config.as_deref())
}

/// Print the effective configuration, secrets masked.
fn show_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = PorteroConfig::resolve(path)?;
    println!("{}", serde_json::to_string_pretty(&config.redacted_json()?)?);
    Ok(())
}

fn validate_config(path: Option<PathBuf>) -> Result<()> {
    ui::header("Validating Configuration");

    let path = path.unwrap_or_else(PorteroConfig::default_path);
    if !path.exists() {
        ui::warning(&format!("Config file not found: {}", path.display()));
        ui::info("Defaults apply; checking those instead");
    }

    let config = if path.exists() {
        match PorteroConfig::load(&path) {
            Ok(config) => {
                ui::success("Syntax and schema: valid");
                config
            }
            Err(e) => {
                ui::error(&e.to_string());
                anyhow::bail!("Configuration is invalid");
            }
        }
    } else {
        PorteroConfig::default()
    };

    let config = config.with_env_overrides();
    if let Err(e) = config.validate() {
        ui::error(&format!("After environment overrides: {e}"));
        anyhow::bail!("Configuration is invalid");
    }

    let warnings = config.warnings();
    if warnings.is_empty() {
        ui::success("No warnings");
    } else {
        for w in warnings {
            ui::warning(&w);
        }
    }

    Ok(())
}
