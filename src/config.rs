//! Configuration module for the directory watcher.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `FSWATCHER_` and use double
//! underscores to separate nested levels:
//! - `FSWATCHER_WATCH__MAX_WATCHES=2048` sets `watch.max_watches`
//! - `FSWATCHER_DAEMON__PID_FILE=/tmp/fw.pid` sets `daemon.pid_file`
//! - `FSWATCHER_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::watcher::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_CALLBACKS, DEFAULT_MAX_WATCHES};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FSWATCHER_";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    /// Watch engine settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Background service settings
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Watch every subdirectory, including ones created later
    #[serde(default)]
    pub recursive: bool,

    /// Filename globs; empty means every file
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Ceiling on live watches
    #[serde(default = "default_max_watches")]
    pub max_watches: usize,

    /// Ceiling on registered callbacks
    #[serde(default = "default_max_callbacks")]
    pub max_callbacks: usize,

    /// Bytes read from the notification source per iteration
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DaemonConfig {
    /// Fork into the background
    #[serde(default)]
    pub enabled: bool,

    /// Where the process id is recorded in daemon mode
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `fswatcher::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,

    /// Write logs to this file instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_max_watches() -> usize {
    DEFAULT_MAX_WATCHES
}
fn default_max_callbacks() -> usize {
    DEFAULT_MAX_CALLBACKS
}
fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}
fn default_pid_file() -> PathBuf {
    PathBuf::from("/var/run/fswatcher.pid")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            patterns: Vec::new(),
            max_watches: default_max_watches(),
            max_callbacks: default_max_callbacks(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pid_file: default_pid_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Filter directive string for `EnvFilter`, e.g. `info,fswatcher::watcher=debug`.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.default.clone();
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();
        for (module, level) in modules {
            filter.push_str(&format!(",{module}={level}"));
        }
        filter
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// Uses `config_path` when given, otherwise the per-user config file
    /// if it exists.
    pub fn load(config_path: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path);

        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }

        figment
            // Double underscore separates nested levels, single underscore
            // stays within field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from a specific file, ignoring the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(Box::new)
    }

    /// `<config dir>/fswatcher/settings.toml`, e.g. `~/.config/fswatcher/settings.toml`.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fswatcher").join("settings.toml"))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Log file to use: the configured one, or next to the PID file when
    /// running detached (stderr is /dev/null there).
    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging.file.clone().or_else(|| {
            self.daemon
                .enabled
                .then(|| self.daemon.pid_file.with_extension("log"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(!settings.watch.recursive);
        assert!(settings.watch.patterns.is_empty());
        assert_eq!(settings.watch.max_watches, 512);
        assert_eq!(settings.watch.max_callbacks, 20);
        assert_eq!(settings.daemon.pid_file, PathBuf::from("/var/run/fswatcher.pid"));
        assert_eq!(settings.logging.default, "info");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
[watch]
recursive = true
patterns = ["*.log", "*.txt"]
max_watches = 64

[daemon]
pid_file = "/tmp/fw.pid"

[logging]
default = "warn"

[logging.modules]
"fswatcher::watcher" = "debug"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        assert!(settings.watch.recursive);
        assert_eq!(settings.watch.patterns, vec!["*.log", "*.txt"]);
        assert_eq!(settings.watch.max_watches, 64);
        // Unspecified values keep their defaults
        assert_eq!(settings.watch.max_callbacks, 20);
        assert!(!settings.daemon.enabled);
        assert_eq!(settings.daemon.pid_file, PathBuf::from("/tmp/fw.pid"));
        assert_eq!(
            settings.logging.filter_directives(),
            "warn,fswatcher::watcher=debug"
        );
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested/settings.toml");

        let mut settings = Settings::default();
        settings.watch.max_watches = 2;
        settings.watch.patterns = vec!["*.rs".to_string()];

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.watch.max_watches, 2);
        assert_eq!(loaded.watch.patterns, vec!["*.rs"]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.watch.max_watches, DEFAULT_MAX_WATCHES);
    }

    #[test]
    fn test_log_file_defaults_next_to_pid_file_in_daemon_mode() {
        let mut settings = Settings::default();
        assert_eq!(settings.log_file(), None);

        settings.daemon.enabled = true;
        settings.daemon.pid_file = PathBuf::from("/tmp/fw.pid");
        assert_eq!(settings.log_file(), Some(PathBuf::from("/tmp/fw.log")));

        settings.logging.file = Some(PathBuf::from("/var/log/fw.log"));
        assert_eq!(settings.log_file(), Some(PathBuf::from("/var/log/fw.log")));
    }
}
