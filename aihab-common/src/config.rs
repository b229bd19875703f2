//! Bootstrap configuration resolution
//!
//! Each setting is resolved independently in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`AIHAB_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the service logs a warning and
//! starts on defaults. A TOML file that exists but does not parse is.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable names
pub const ENV_HOST: &str = "AIHAB_HOST";
pub const ENV_PORT: &str = "AIHAB_PORT";
pub const ENV_TAXONOMY_PATH: &str = "AIHAB_TAXONOMY_PATH";
pub const ENV_MODEL_PATH: &str = "AIHAB_MODEL_PATH";
pub const ENV_MODEL_VERSION: &str = "AIHAB_MODEL_VERSION";
pub const ENV_LOG_LEVEL: &str = "AIHAB_LOG_LEVEL";

/// Config file contents
///
/// Every field is optional; anything absent falls through to the compiled
/// default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Path to the UKHab taxonomy JSON document
    #[serde(default)]
    pub taxonomy_path: Option<PathBuf>,

    /// Path to the exported classification model
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default)]
    pub model_version: Option<String>,

    #[serde(default)]
    pub taxonomy_version: Option<String>,

    /// Message attached to every prediction response; empty disables it
    #[serde(default)]
    pub user_message: Option<String>,

    /// Codes terminal at level 1 that do not follow prefix growth
    #[serde(default)]
    pub irregular_codes: Option<Vec<String>>,

    /// Model output index → habitat code, replacing the built-in table
    #[serde(default)]
    pub labels: Option<Vec<String>>,

    #[serde(default)]
    pub max_upload_bytes: Option<usize>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
    }
}

/// Compiled defaults (lowest priority)
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub host: String,
    pub port: u16,
    pub taxonomy_path: PathBuf,
    pub model_version: String,
    pub taxonomy_version: String,
    pub user_message: String,
    pub irregular_codes: Vec<String>,
    pub max_upload_bytes: usize,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            taxonomy_path: PathBuf::from("data/ukhab.json"),
            model_version: "default".to_string(),
            taxonomy_version: "2.01".to_string(),
            user_message: "In development, use with caution.".to_string(),
            irregular_codes: vec!["sea".to_string(), "montane".to_string()],
            max_upload_bytes: 20 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

/// Command-line overrides (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub taxonomy_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub model_version: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub taxonomy_path: PathBuf,
    pub model_path: Option<PathBuf>,
    pub model_version: String,
    pub taxonomy_version: String,
    pub user_message: Option<String>,
    pub irregular_codes: Vec<String>,
    pub labels: Option<Vec<String>>,
    pub max_upload_bytes: usize,
    pub log_level: String,
    /// TOML file the settings were read from, if any
    pub config_file: Option<PathBuf>,
}

impl ServiceConfig {
    /// Resolve every setting from CLI → ENV → TOML → defaults
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let config_file = locate_config_file(overrides.config_file.as_deref())?;
        let toml_config = match &config_file {
            Some(path) => {
                info!("Reading config file: {}", path.display());
                TomlConfig::load(path)?
            }
            None => TomlConfig::default(),
        };

        Self::from_sources(overrides, &toml_config, config_file)
    }

    /// Merge already-loaded sources (environment read here)
    pub fn from_sources(
        overrides: &ConfigOverrides,
        toml_config: &TomlConfig,
        config_file: Option<PathBuf>,
    ) -> Result<Self> {
        let defaults = CompiledDefaults::default();

        let env_port = match env_string(ENV_PORT) {
            Some(raw) => Some(raw.parse::<u16>().map_err(|e| {
                Error::Config(format!("{} must be a port number, got '{}': {}", ENV_PORT, raw, e))
            })?),
            None => None,
        };

        let user_message = toml_config
            .user_message
            .clone()
            .unwrap_or(defaults.user_message);

        Ok(Self {
            host: overrides
                .host
                .clone()
                .or_else(|| env_string(ENV_HOST))
                .or_else(|| toml_config.host.clone())
                .unwrap_or(defaults.host),
            port: overrides
                .port
                .or(env_port)
                .or(toml_config.port)
                .unwrap_or(defaults.port),
            taxonomy_path: overrides
                .taxonomy_path
                .clone()
                .or_else(|| env_string(ENV_TAXONOMY_PATH).map(PathBuf::from))
                .or_else(|| toml_config.taxonomy_path.clone())
                .unwrap_or(defaults.taxonomy_path),
            model_path: overrides
                .model_path
                .clone()
                .or_else(|| env_string(ENV_MODEL_PATH).map(PathBuf::from))
                .or_else(|| toml_config.model_path.clone()),
            model_version: overrides
                .model_version
                .clone()
                .or_else(|| env_string(ENV_MODEL_VERSION))
                .or_else(|| toml_config.model_version.clone())
                .unwrap_or(defaults.model_version),
            taxonomy_version: toml_config
                .taxonomy_version
                .clone()
                .unwrap_or(defaults.taxonomy_version),
            user_message: if user_message.trim().is_empty() {
                None
            } else {
                Some(user_message)
            },
            irregular_codes: toml_config
                .irregular_codes
                .clone()
                .unwrap_or(defaults.irregular_codes),
            labels: toml_config.labels.clone(),
            max_upload_bytes: toml_config
                .max_upload_bytes
                .unwrap_or(defaults.max_upload_bytes),
            log_level: overrides
                .log_level
                .clone()
                .or_else(|| env_string(ENV_LOG_LEVEL))
                .or_else(|| toml_config.logging.level.clone())
                .unwrap_or(defaults.log_level),
            config_file,
        })
    }

    /// Socket address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Non-empty environment variable value
fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Find the TOML config file
///
/// An explicit path must exist. Otherwise `<config dir>/aihab/config.toml`
/// is used when present, and no file at all is fine.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let user_config = dirs::config_dir().map(|d| d.join("aihab").join("config.toml"));
    match user_config {
        Some(path) if path.exists() => Ok(Some(path)),
        _ => {
            warn!("No config file found, using environment and compiled defaults");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_defaults() {
        let defaults = CompiledDefaults::default();
        assert_eq!(defaults.port, 8000);
        assert_eq!(defaults.model_version, "default");
        assert_eq!(defaults.taxonomy_version, "2.01");
        assert_eq!(defaults.irregular_codes, vec!["sea", "montane"]);
    }

    #[test]
    fn test_toml_parses_partial_file() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 9100
            irregular_codes = ["sea"]

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, Some(9100));
        assert!(config.host.is_none());
        assert_eq!(config.irregular_codes, Some(vec!["sea".to_string()]));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_explicit_missing_config_file_is_error() {
        let result = locate_config_file(Some(Path::new("/nonexistent/aihab/config.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
