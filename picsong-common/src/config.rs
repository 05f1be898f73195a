//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument
//! 2. Environment variable (handled together with 1 by the binary's argument parser)
//! 3. TOML bootstrap file
//! 4. Compiled default
//!
//! The result is a single [`AppConfig`] built once at startup and handed to
//! the components that need it.

use crate::storage::StorageLayout;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_STORAGE_ROOT: &str = "./data";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_SYNTHESIS_MODEL: &str = "lyria-002";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Bootstrap configuration loaded from the TOML file
///
/// Every field is optional; anything missing falls back to the command line,
/// the environment or the compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Cloud project identifier
    #[serde(default)]
    pub project_id: Option<String>,

    /// Cloud region, e.g. `us-central1`
    #[serde(default)]
    pub location: Option<String>,

    /// Path to a service-account JSON key
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    /// Directory holding `uploads/`, `outputs/` and `prompts/`
    #[serde(default)]
    pub storage_root: Option<PathBuf>,

    /// Multimodal model used to describe images
    #[serde(default)]
    pub analysis_model: Option<String>,

    /// Audio generation model
    #[serde(default)]
    pub synthesis_model: Option<String>,

    /// Override for the API base URL (defaults to the regional endpoint)
    #[serde(default)]
    pub api_endpoint: Option<String>,

    /// Per-request timeout for upstream calls, in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

/// Default location of the TOML bootstrap file
///
/// `~/.config/picsong/picsong.toml` on Linux, the platform config dir elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("picsong").join("picsong.toml"))
}

/// Load the TOML bootstrap file
///
/// A missing file is not an error: a warning is logged and defaults apply.
/// A file that exists but does not parse is a startup error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Values taken from the command line or the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub access_token: Option<String>,
    pub storage_root: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Resolved application configuration
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub project_id: String,
    pub location: String,
    pub credentials_path: Option<PathBuf>,
    /// Externally supplied bearer token; takes precedence over the key file
    pub access_token: Option<String>,
    pub storage_root: PathBuf,
    pub analysis_model: String,
    pub synthesis_model: String,
    pub api_endpoint: String,
    pub request_timeout: Duration,
    pub log_level: String,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("credentials_path", &self.credentials_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("storage_root", &self.storage_root)
            .field("analysis_model", &self.analysis_model)
            .field("synthesis_model", &self.synthesis_model)
            .field("api_endpoint", &self.api_endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Regional API endpoint for a location
pub fn regional_endpoint(location: &str) -> String {
    format!("https://{}-aiplatform.googleapis.com", location)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Merge overrides over the TOML file over compiled defaults
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Self {
        let location = non_empty(overrides.location)
            .or(non_empty(toml.location))
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        let api_endpoint = non_empty(toml.api_endpoint)
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| regional_endpoint(&location));

        Self {
            port: overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            project_id: non_empty(overrides.project_id)
                .or(non_empty(toml.project_id))
                .unwrap_or_default(),
            location,
            credentials_path: overrides.credentials_path.or(toml.credentials_path),
            access_token: non_empty(overrides.access_token),
            storage_root: overrides
                .storage_root
                .or(toml.storage_root)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT)),
            analysis_model: non_empty(toml.analysis_model)
                .unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.to_string()),
            synthesis_model: non_empty(toml.synthesis_model)
                .unwrap_or_else(|| DEFAULT_SYNTHESIS_MODEL.to_string()),
            api_endpoint,
            request_timeout: Duration::from_secs(
                toml.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            log_level: non_empty(overrides.log_level)
                .or(non_empty(toml.logging.level))
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Fail fast on missing project or credentials
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(Error::Config(
                "Cloud project id not configured. Please configure using one of:\n\
                 1. Command line: --project-id <id>\n\
                 2. Environment: PICSONG_PROJECT_ID=<id>\n\
                 3. TOML config: project_id = \"<id>\""
                    .to_string(),
            ));
        }

        if self.access_token.is_some() {
            return Ok(());
        }

        match &self.credentials_path {
            Some(path) if path.is_file() => Ok(()),
            Some(path) => Err(Error::Config(format!(
                "Credentials file not found: {}",
                path.display()
            ))),
            None => Err(Error::Config(
                "No credentials configured. Provide a service-account key with \
                 --credentials / PICSONG_CREDENTIALS / credentials_path, or a bearer \
                 token with PICSONG_ACCESS_TOKEN"
                    .to_string(),
            )),
        }
    }

    pub fn storage(&self) -> StorageLayout {
        StorageLayout::new(&self.storage_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_when_nothing_set() {
        let config = AppConfig::resolve(ConfigOverrides::default(), TomlConfig::default());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.location, DEFAULT_LOCATION);
        assert_eq!(config.api_endpoint, "https://us-central1-aiplatform.googleapis.com");
        assert_eq!(config.storage_root, PathBuf::from(DEFAULT_STORAGE_ROOT));
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        assert!(config.project_id.is_empty());
    }

    #[test]
    fn test_overrides_beat_toml() {
        let toml = TomlConfig {
            port: Some(8080),
            project_id: Some("from-toml".to_string()),
            location: Some("europe-west4".to_string()),
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            port: Some(9090),
            project_id: Some("from-cli".to_string()),
            ..Default::default()
        };

        let config = AppConfig::resolve(overrides, toml);
        assert_eq!(config.port, 9090);
        assert_eq!(config.project_id, "from-cli");
        assert_eq!(config.location, "europe-west4");
        assert_eq!(config.api_endpoint, "https://europe-west4-aiplatform.googleapis.com");
    }

    #[test]
    fn test_blank_override_does_not_mask_toml() {
        let toml = TomlConfig {
            project_id: Some("from-toml".to_string()),
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            project_id: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(AppConfig::resolve(overrides, toml).project_id, "from-toml");
    }

    #[test]
    fn test_validate_requires_project_and_credentials() {
        let mut config = AppConfig::resolve(ConfigOverrides::default(), TomlConfig::default());
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.project_id = "demo".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.credentials_path = Some(PathBuf::from("/nonexistent/key.json"));
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.access_token = Some("token".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_access_token() {
        let overrides = ConfigOverrides {
            access_token: Some("super-secret".to_string()),
            ..Default::default()
        };
        let config = AppConfig::resolve(overrides, TomlConfig::default());
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
