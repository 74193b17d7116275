use anyhow::{Context, Result};
use proclimit_core::Defaults;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

/// Main configuration for proclimit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed limits for a process's first `set`, e.g. `memory = "512m"`
    pub defaults: BTreeMap<String, String>,

    /// Host platform settings
    pub platform: PlatformConfig,

    /// Logging configuration
    pub logging: LogConfig,
}

/// Host platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Apps root directory, used when DOKKU_ROOT / --root are not given
    pub root: Option<PathBuf>,

    /// Command run to restart an app; the app name is appended
    /// (default: plugn trigger app-restart)
    pub restart_command: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level filter when RUST_LOG is unset (default: info)
    pub level: String,

    /// Directory for a daily rolling log file; stderr only when unset
    pub log_dir: Option<PathBuf>,

    /// Log file name prefix (default: proclimit.log)
    pub log_file: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            root: None,
            restart_command: vec![
                "plugn".to_string(),
                "trigger".to_string(),
                "app-restart".to_string(),
            ],
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            log_file: "proclimit.log".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use proclimit_cli::config::Config;
    ///
    /// let config = Config::load_from_file("/etc/proclimit/config.toml".as_ref()).unwrap();
    /// println!("Restart command: {:?}", config.platform.restart_command);
    /// ```
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file {:?}", path))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        self.seed_defaults().map_err(|e| format!("Invalid [defaults]: {}", e))?;

        if self.platform.restart_command.is_empty() {
            return Err("Restart command must not be empty".to_string());
        }

        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(format!("Unknown log level: {}", self.logging.level));
        }

        if self.logging.log_file.is_empty() {
            return Err("Log file name must not be empty".to_string());
        }

        Ok(())
    }

    /// Parsed and validated `[defaults]` table
    pub fn seed_defaults(&self) -> proclimit_core::Result<Defaults> {
        Defaults::from_pairs(
            self.defaults
                .iter()
                .map(|(kind, value)| (kind.as_str(), value.as_str())),
        )
    }
}
