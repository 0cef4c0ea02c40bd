//! CLI command implementations.

pub mod admin;
pub mod config;
pub mod gateway;
pub mod secret;
pub mod service;
pub mod token;

pub use admin::run_admin;
pub use config::run_config;
pub use gateway::run_gateway;
pub use secret::run_secret;
pub use service::run_service;
pub use token::run_token;
