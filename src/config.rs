use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for aptsentry
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Directory holding the active `*.list` declaration files
    #[serde(default = "default_sources_directory")]
    pub sources_directory: String,

    /// Name of the quarantine subdirectory inside `sources_directory`
    #[serde(default = "default_retired_directory_name")]
    pub retired_directory_name: String,

    /// Declaration files that are never scanned
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,

    /// Network probing behaviour
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network probe configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProbeConfig {
    /// Timeout for a single DNS lookup, connect or retrieval, in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// User-Agent sent with every index retrieval (defaults to "aptsentry <version>")
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Well-known endpoint used to verify general connectivity before a sweep
    #[serde(default = "default_connectivity_url")]
    pub connectivity_url: String,

    /// Port probed for each mirror scheme; schemes missing here are never online
    #[serde(default = "default_service_ports")]
    pub service_ports: BTreeMap<String, u16>,

    /// Maximum declarations classified at once
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Trace every individual probe
    #[serde(default)]
    pub verbose: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_sources_directory() -> String {
    "/etc/apt/sources.list.d".to_string()
}
fn default_retired_directory_name() -> String {
    "retired".to_string()
}
fn default_exclusions() -> Vec<String> {
    vec!["cydia.list".to_string()]
}
fn default_timeout() -> u64 {
    3
}
fn default_connectivity_url() -> String {
    "http://www.google.com/".to_string()
}
fn default_service_ports() -> BTreeMap<String, u16> {
    BTreeMap::from([("ftp".to_string(), 21), ("http".to_string(), 80)])
}
fn default_max_parallel() -> usize {
    4
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: None,
            connectivity_url: default_connectivity_url(),
            service_ports: default_service_ports(),
            max_parallel: default_max_parallel(),
            verbose: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            return Self::load(&config_path);
        }

        let mut config = Self::default();

        // A read-only config dir must not block a sweep
        if let Err(e) = config.write_default(&config_path) {
            tracing::warn!("Could not write default configuration: {:#}", e);
        } else {
            tracing::info!("Created default configuration at: {:?}", config_path);
        }

        config.expand_paths()?;
        Ok(config)
    }

    fn write_default(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        self.save(config_path)
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("aptsentry").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.sources_directory = shellexpand::full(&self.sources_directory)
            .context("Failed to expand sources_directory path")?
            .into_owned();

        Ok(())
    }

    /// Active declaration directory
    pub fn sources_directory(&self) -> PathBuf {
        PathBuf::from(&self.sources_directory)
    }

    /// Quarantine directory for retired declarations
    pub fn retired_directory(&self) -> PathBuf {
        self.sources_directory().join(&self.retired_directory_name)
    }

    /// Client identifier sent with index retrievals
    pub fn user_agent(&self) -> String {
        self.probe
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("aptsentry {}", env!("CARGO_PKG_VERSION")))
    }

    /// Per-probe timeout, never below one second
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout.max(1))
    }

    /// Worker-pool bound, never below one
    pub fn max_parallel(&self) -> usize {
        self.probe.max_parallel.max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources_directory: default_sources_directory(),
            retired_directory_name: default_retired_directory_name(),
            exclusions: default_exclusions(),
            probe: ProbeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
