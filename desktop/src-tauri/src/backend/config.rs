//! Shell configuration with validation and versioning.

use crate::backend::{
    BackendError, BackendResult, BackendSettings, LoggingSettings, ReadinessSettings,
    ResilienceSettings, WindowSettings,
};

use std::panic::Location;
use std::path::{Path, PathBuf};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Configuration version for migration support.
/// Increment when adding new fields or changing structure.
pub const CONFIG_VERSION: u32 = 1;

pub const CONFIG_FILENAME: &str = "config.toml";

pub const ENV_BASE_PORT: &str = "PARAMX_BASE_PORT";
pub const ENV_APP_ROOT: &str = "PARAMX_APP_ROOT";
pub const ENV_PYTHON: &str = "PARAMX_PYTHON";
pub const ENV_LOG_LEVEL: &str = "PARAMX_LOG_LEVEL";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_MODULE: &str = "streamlit";
const DEFAULT_ENTRY_POINT: &str = "main.py";
const DEFAULT_BASE_PORT: u16 = 8501;
const DEFAULT_PORT_ATTEMPTS: u16 = 100;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 500;
const DEFAULT_RESTART_BACKOFF_MS: u64 = 2000;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;
const DEFAULT_STABLE_UPTIME_SECS: u64 = 60;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_RETENTION_DAYS: usize = 7;
const DEFAULT_WINDOW_TITLE: &str = "Power Device Parameter Extractor";
const DEFAULT_WINDOW_WIDTH: f64 = 1280.0;
const DEFAULT_WINDOW_HEIGHT: f64 = 800.0;

const MIN_PORT: u16 = 1024;
const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Config file format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// How the backend is launched
    #[serde(default)]
    pub backend: BackendSettings,

    /// Readiness polling
    #[serde(default)]
    pub readiness: ReadinessSettings,

    /// Crash restart and shutdown
    #[serde(default)]
    pub resilience: ResilienceSettings,

    /// Host diagnostic log
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Main window geometry
    #[serde(default)]
    pub window: WindowSettings,
}

// === Default Value Functions ===

fn default_version() -> u32 {
    CONFIG_VERSION
}
pub(crate) fn default_host() -> String {
    DEFAULT_HOST.into()
}
pub(crate) fn default_module() -> String {
    DEFAULT_MODULE.into()
}
pub(crate) fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.into()
}
pub(crate) fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}
pub(crate) fn default_port_attempts() -> u16 {
    DEFAULT_PORT_ATTEMPTS
}
pub(crate) fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
pub(crate) fn default_startup_timeout() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_SECS
}
pub(crate) fn default_probe_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}
pub(crate) fn default_restart_backoff() -> u64 {
    DEFAULT_RESTART_BACKOFF_MS
}
pub(crate) fn default_shutdown_timeout() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}
pub(crate) fn default_stable_uptime() -> u64 {
    DEFAULT_STABLE_UPTIME_SECS
}
pub(crate) fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.into()
}
pub(crate) fn default_log_dir() -> String {
    DEFAULT_LOG_DIR.into()
}
pub(crate) fn default_log_retention() -> usize {
    DEFAULT_LOG_RETENTION_DAYS
}
pub(crate) fn default_window_title() -> String {
    DEFAULT_WINDOW_TITLE.into()
}
pub(crate) fn default_window_width() -> f64 {
    DEFAULT_WINDOW_WIDTH
}
pub(crate) fn default_window_height() -> f64 {
    DEFAULT_WINDOW_HEIGHT
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: BackendSettings::default(),
            readiness: ReadinessSettings::default(),
            resilience: ResilienceSettings::default(),
            logging: LoggingSettings::default(),
            window: WindowSettings::default(),
        }
    }
}

// === Configuration Operations ===

impl ShellConfig {
    /// Load config from file, creating default if not exists.
    ///
    /// Environment overrides are applied after loading and are never
    /// written back to disk.
    pub fn load_or_create(config_dir: &Path) -> BackendResult<Self> {
        let config_path = config_dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let mut config: Self =
                toml::from_str(&content).map_err(|e| BackendError::ConfigInvalid {
                    message: e.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })?;

            if config.version < CONFIG_VERSION {
                config = Self::migrate(config);
                config.save(config_dir)?;
            }
            config
        } else {
            let config = Self::default();
            config.save(config_dir)?;
            info!("Created default config at {}", config_path.display());
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save config to file atomically.
    pub fn save(&self, config_dir: &Path) -> BackendResult<()> {
        std::fs::create_dir_all(config_dir).map_err(|e| BackendError::DirCreation {
            path: config_dir.to_path_buf(),
            source: e,
            location: ErrorLocation::from(Location::caller()),
        })?;

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = toml::to_string_pretty(self).map_err(|e| BackendError::ConfigInvalid {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let temp_path = config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, &config_path)?;

        Ok(())
    }

    fn migrate(mut config: Self) -> Self {
        // Version 0 -> 1: resilience section introduced
        if config.version == 0 {
            config.resilience = ResilienceSettings::default();
            config.version = 1;
        }

        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(ENV_BASE_PORT) {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.backend.base_port = port,
                Err(e) => warn!("Ignoring {ENV_BASE_PORT}={raw}: {e}"),
            }
        }
        if let Some(root) = non_empty_env(ENV_APP_ROOT) {
            self.backend.app_root = Some(PathBuf::from(root));
        }
        if let Some(python) = non_empty_env(ENV_PYTHON) {
            self.backend.interpreter = Some(python);
        }
        if let Some(level) = non_empty_env(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> BackendResult<()> {
        if self.backend.base_port < MIN_PORT {
            return Err(invalid(format!(
                "Base port must be >= {MIN_PORT} (unprivileged)"
            )));
        }

        if self.backend.port_attempts == 0 {
            return Err(invalid("Port attempts must be > 0".into()));
        }

        if !LOOPBACK_HOSTS.contains(&self.backend.host.as_str()) {
            return Err(invalid(format!(
                "Host must be one of {LOOPBACK_HOSTS:?} for security"
            )));
        }

        if self.backend.entry_point.trim().is_empty() {
            return Err(invalid("Entry point must not be empty".into()));
        }

        if self.readiness.poll_interval_ms == 0 {
            return Err(invalid("Poll interval must be > 0".into()));
        }

        if self.readiness.startup_timeout_secs == 0 {
            return Err(invalid("Startup timeout must be > 0".into()));
        }

        if self.readiness.probe_timeout_ms == 0 {
            return Err(invalid("Probe timeout must be > 0".into()));
        }

        // The poller abandons a probe at the next tick
        if self.readiness.probe_timeout_ms > self.readiness.poll_interval_ms {
            return Err(invalid(
                "Probe timeout must not exceed the poll interval".into(),
            ));
        }

        if self.readiness.poll_interval() >= self.readiness.startup_timeout() {
            return Err(invalid(
                "Poll interval must be shorter than the startup timeout".into(),
            ));
        }

        if self.resilience.shutdown_timeout_secs == 0 {
            return Err(invalid("Shutdown timeout must be > 0".into()));
        }

        if self.resilience.stable_uptime_secs == 0 {
            return Err(invalid("Stable uptime must be > 0".into()));
        }

        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[track_caller]
fn invalid(message: String) -> BackendError {
    BackendError::ConfigInvalid {
        message,
        location: ErrorLocation::from(Location::caller()),
    }
}
