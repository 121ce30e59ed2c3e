//! Configuration loading and resolution
//!
//! Every setting resolves in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and defaults are
//! used. A TOML file that exists but does not parse is `Error::Config`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Application directory name under the platform config/data dirs
const APP_DIR: &str = "asincheck";

pub const ENV_CONFIG_PATH: &str = "ASINCHECK_CONFIG";
pub const ENV_BASE_URL: &str = "ASINCHECK_BASE_URL";
pub const ENV_REQUEST_DELAY_MS: &str = "ASINCHECK_REQUEST_DELAY_MS";
pub const ENV_REFRESH_THROTTLE_MS: &str = "ASINCHECK_REFRESH_THROTTLE_MS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "ASINCHECK_REQUEST_TIMEOUT_SECS";
pub const ENV_SESSION_FILE: &str = "ASINCHECK_SESSION_FILE";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// On-disk TOML configuration; every key optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Pause between consecutive per-ASIN requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    /// Minimum spacing between subscription refreshes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_throttle_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_bus_capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub base_url: String,
    pub request_delay_ms: u64,
    pub refresh_throttle_ms: u64,
    pub request_timeout_secs: u64,
    pub event_bus_capacity: usize,
    pub session_file: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let session_file = dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
            .join("session.json");

        Self {
            base_url: "http://localhost:3000/api".to_string(),
            request_delay_ms: 200,
            refresh_throttle_ms: 5000,
            request_timeout_secs: 30,
            event_bus_capacity: 100,
            session_file,
            log_level: default_log_level(),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
}

/// Fully resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_delay: Duration,
    pub refresh_throttle: Duration,
    pub request_timeout: Duration,
    pub event_bus_capacity: usize,
    pub session_file: PathBuf,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            base_url: defaults.base_url,
            request_delay: Duration::from_millis(defaults.request_delay_ms),
            refresh_throttle: Duration::from_millis(defaults.refresh_throttle_ms),
            request_timeout: Duration::from_secs(defaults.request_timeout_secs),
            event_bus_capacity: defaults.event_bus_capacity,
            session_file: defaults.session_file,
            log_level: defaults.log_level,
        }
    }
}

/// Resolves [`ClientConfig`] from CLI, environment, TOML and defaults
pub struct ConfigResolver {
    overrides: ConfigOverrides,
}

impl ConfigResolver {
    pub fn new(overrides: ConfigOverrides) -> Self {
        Self { overrides }
    }

    /// TOML path: `--config`, then `ASINCHECK_CONFIG`, then the platform default
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.overrides.config_path {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        default_config_path()
    }

    /// Load the TOML file, falling back to an empty config when it is missing
    pub fn load_toml(&self) -> Result<TomlConfig> {
        let Some(path) = self.config_path() else {
            warn!("Could not determine config directory, using defaults");
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            warn!("Config file not found: {} (using defaults)", path.display());
            return Ok(TomlConfig::default());
        }

        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    pub fn resolve(&self) -> Result<ClientConfig> {
        let toml_config = self.load_toml()?;
        self.resolve_with(&toml_config)
    }

    /// Resolve against an already-loaded TOML config
    pub fn resolve_with(&self, toml_config: &TomlConfig) -> Result<ClientConfig> {
        let defaults = CompiledDefaults::for_current_platform();

        let base_url = self
            .overrides
            .base_url
            .clone()
            .or_else(|| env_string(ENV_BASE_URL))
            .or_else(|| toml_config.base_url.clone())
            .unwrap_or(defaults.base_url);
        let base_url = normalize_base_url(&base_url)?;

        let request_delay_ms = env_u64(ENV_REQUEST_DELAY_MS)?
            .or(toml_config.request_delay_ms)
            .unwrap_or(defaults.request_delay_ms);

        let refresh_throttle_ms = env_u64(ENV_REFRESH_THROTTLE_MS)?
            .or(toml_config.refresh_throttle_ms)
            .unwrap_or(defaults.refresh_throttle_ms);

        let request_timeout_secs = env_u64(ENV_REQUEST_TIMEOUT_SECS)?
            .or(toml_config.request_timeout_secs)
            .unwrap_or(defaults.request_timeout_secs);
        if request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be > 0".to_string()));
        }

        let event_bus_capacity = toml_config
            .event_bus_capacity
            .unwrap_or(defaults.event_bus_capacity);
        if event_bus_capacity == 0 {
            return Err(Error::Config("event_bus_capacity must be > 0".to_string()));
        }

        let session_file = env_string(ENV_SESSION_FILE)
            .map(PathBuf::from)
            .or_else(|| toml_config.session_file.clone())
            .unwrap_or(defaults.session_file);

        Ok(ClientConfig {
            base_url,
            request_delay: Duration::from_millis(request_delay_ms),
            refresh_throttle: Duration::from_millis(refresh_throttle_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            event_bus_capacity,
            session_file,
            log_level: toml_config.logging.level.clone(),
        })
    }
}

/// `<config_dir>/asincheck/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Write a TOML config atomically (temp file + rename), 0600 on Unix
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Trim trailing slashes and require an http(s) scheme
fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "base_url must start with http:// or https:// (got {:?})",
            raw
        )));
    }
    Ok(trimmed.to_string())
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be a non-negative integer (got {:?})", name, raw))),
        None => Ok(None),
    }
}
