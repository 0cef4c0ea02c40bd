//! Configuration loading and validation.
//!
//! JSON5 file with `gateway`, `service` and `settings` sections.
//! Config location: `~/.portero/portero.json`

use std::path::{Path, PathBuf};

use portero_gateway::GatewayConfig;
use portero_service::ServiceConfig;
use portero_token::MIN_SECRET_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Process-wide settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log at debug level.
    #[serde(default)]
    pub debug: bool,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PorteroConfig {
    /// Edge gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Backend service.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Process settings.
    #[serde(default)]
    pub settings: Settings,
}

impl PorteroConfig {
    /// Load from `path` if given, else from the default location, then
    /// apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit path is missing, any file fails to
    /// parse, or the result fails validation after overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve_with(path, |key| std::env::var(key).ok())
    }

    /// [`resolve`](Self::resolve) with an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn resolve_with(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::load_default()?,
        };
        let source = path.map_or_else(Self::default_path, Path::to_path_buf);
        tracing::debug!(path = %source.display(), "Configuration resolved");

        let config = config.with_overrides_from(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location, or defaults if the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but fails to parse or validate.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if reading, parsing or validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate JSON5 content.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("portero.json")
    }

    /// Get the Portero state directory.
    ///
    /// Uses `PORTERO_STATE_DIR` env var if set, otherwise `~/.portero`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("PORTERO_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".portero")
        } else {
            PathBuf::from(".portero")
        }
    }

    /// Apply `PORTERO_*` environment overrides to both sections.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.gateway = self.gateway.with_overrides_from(&lookup);
        self.service = self.service.with_overrides_from(&lookup);
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }
        if !self.gateway.filter.protected_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "protectedPath must start with '/': {}",
                self.gateway.filter.protected_path
            )));
        }
        self.service.validate().map_err(ConfigError::Validation)?;
        for route in &self.gateway.routes {
            if !route.upstream.starts_with("http://") && !route.upstream.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "Route '{}' has a non-HTTP upstream: {}",
                    route.path_prefix, route.upstream
                )));
            }
        }
        Ok(())
    }

    /// Problems that do not stop start-up but should be fixed.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.gateway.filter.jwt_secret.len() < MIN_SECRET_LEN {
            warnings.push(format!(
                "gateway.jwtSecret is shorter than {MIN_SECRET_LEN} bytes; protected paths will fail"
            ));
        } else if self.gateway.filter.uses_default_secret() {
            warnings.push("gateway.jwtSecret is the shipped default".to_string());
        }
        if self.service.uses_default_secret() {
            warnings.push("service.jwtSecret is the shipped default".to_string());
        }
        if self.gateway.filter.jwt_secret != self.service.jwt_secret {
            warnings.push(
                "gateway and service secrets differ; service tokens will not pass the gateway"
                    .to_string(),
            );
        }
        if self.gateway.routes.is_empty() {
            warnings.push("gateway.routes is empty".to_string());
        }
        if self.gateway.filter.allowed_roles.is_empty() {
            warnings.push("gateway.allowedRoles is empty; every protected request gets 403".to_string());
        }

        warnings
    }

    /// JSON rendering with signing secrets masked.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn redacted_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        for section in ["gateway", "service"] {
            if let Some(secret) = value.get_mut(section).and_then(|s| s.get_mut("jwtSecret")) {
                *secret = serde_json::Value::String("[REDACTED]".to_string());
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_json5() {
        let config = PorteroConfig::parse(
            r#"{
                // gateway in front of one backend
                gateway: {
                    port: 9000,
                    allowedRoles: ["ROLE_ADMIN"],
                    routes: [{ pathPrefix: "/api/", upstream: "http://127.0.0.1:8080" }],
                },
                service: { tokenLifetimeMinutes: 15 },
                settings: { logFormat: "json" },
            }"#,
        )
        .unwrap();

        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.filter.allowed_roles, vec!["ROLE_ADMIN"]);
        assert_eq!(config.service.token_lifetime_minutes, 15);
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            PorteroConfig::parse("{ gateway: { port: 0 } }"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            PorteroConfig::parse("{ gateway: { protectedPath: 'api' } }"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            PorteroConfig::parse(
                "{ gateway: { routes: [{ pathPrefix: '/', upstream: 'ftp://x' }] } }"
            ),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            PorteroConfig::parse("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_warnings() {
        let config = PorteroConfig::default();
        let warnings = config.warnings();
        assert!(warnings.iter().any(|w| w.contains("gateway.jwtSecret")));
        assert!(warnings.iter().any(|w| w.contains("service.jwtSecret")));

        let config = PorteroConfig::parse("{ gateway: { jwtSecret: 'short' } }").unwrap();
        assert!(config.warnings().iter().any(|w| w.contains("shorter than")));
        assert!(config.warnings().iter().any(|w| w.contains("secrets differ")));
    }

    #[test]
    fn test_redacted_json() {
        let value = PorteroConfig::default().redacted_json().unwrap();
        assert_eq!(value["gateway"]["jwtSecret"], "[REDACTED]");
        assert_eq!(value["service"]["jwtSecret"], "[REDACTED]");
        assert_eq!(value["gateway"]["protectedPath"], "/api/segura/");
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portero.json");
        std::fs::write(&path, "{ service: { port: 9090 } }").unwrap();

        let config = PorteroConfig::load(&path).unwrap();
        assert_eq!(config.service.port, 9090);
        assert!(PorteroConfig::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_overrides_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portero.json");
        std::fs::write(&path, "{ service: { tokenLifetimeMinutes: 30 } }").unwrap();

        let lifetime = |value: &'static str| {
            move |key: &str| (key == "PORTERO_TOKEN_LIFETIME_MINUTES").then(|| value.to_string())
        };

        let config = PorteroConfig::resolve_with(Some(&path), lifetime("15")).unwrap();
        assert_eq!(config.service.token_lifetime_minutes, 15);

        assert!(matches!(
            PorteroConfig::resolve_with(Some(&path), lifetime("0")),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            PorteroConfig::resolve_with(Some(&path), lifetime("400000000000000000")),
            Err(ConfigError::Validation(_))
        ));
    }
}
