//! Configuration management for scriv.
//!
//! Parses `scriv.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! ```toml
//! [storage]
//! backend = "fs"          # "fs" | "sqlite" | "tee"
//! data_dir = "data"       # postings live in data_dir/postings
//! database = "data/postings.db"
//!
//! [cache]
//! enabled = true
//! sweep_interval_secs = 3600
//! ```
//!
//! Relative paths are resolved against the directory holding the config
//! file. CLI settings are applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `storage.data_dir` and `storage.database` support `${VAR}` and
//! `${VAR:-default}`.

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "scriv.toml";

const DEFAULT_DATA_DIR: &str = "data";
const DATABASE_FILENAME: &str = "postings.db";
const POSTINGS_DIR: &str = "postings";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Which persistence backend to use.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One Markdown file per posting.
    #[default]
    Fs,
    /// Single SQLite database.
    Sqlite,
    /// Filesystem and SQLite, written together.
    Tee,
}

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override storage backend.
    pub backend: Option<BackendKind>,
    /// Override data directory.
    pub data_dir: Option<PathBuf>,
    /// Override database file.
    pub database: Option<PathBuf>,
    /// Override cache enabled flag.
    pub cache_enabled: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration (paths are relative strings from TOML).
    storage: StorageConfigRaw,
    /// Render cache configuration.
    pub cache: CacheConfig,

    /// Resolved storage configuration (set after loading).
    #[serde(skip)]
    pub storage_resolved: StorageConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw storage configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StorageConfigRaw {
    backend: Option<BackendKind>,
    data_dir: Option<String>,
    database: Option<String>,
}

/// Resolved storage configuration with absolute paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Active backend.
    pub backend: BackendKind,
    /// Root data directory.
    pub data_dir: PathBuf,
    /// SQLite database file.
    pub database: PathBuf,
}

impl StorageConfig {
    /// Directory holding the sharded posting files (`data_dir/postings`).
    #[must_use]
    pub fn postings_dir(&self) -> PathBuf {
        self.data_dir.join(POSTINGS_DIR)
    }
}

/// Render cache configuration.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether rendered HTML is cached on disk.
    pub enabled: bool,
    /// Seconds between background sweeps of stale entries.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`storage.data_dir`").
        field: String,
        /// Error message (e.g., "${`DATA_ROOT`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `scriv.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    ///
    /// Moving the data directory also moves the database unless the database
    /// path was given explicitly.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(backend) = settings.backend {
            self.storage_resolved.backend = backend;
        }
        if let Some(data_dir) = &settings.data_dir {
            self.storage_resolved.data_dir.clone_from(data_dir);
            if self.storage.database.is_none() {
                self.storage_resolved.database = data_dir.join(DATABASE_FILENAME);
            }
        }
        if let Some(database) = &settings.database {
            self.storage_resolved.database.clone_from(database);
        }
        if let Some(cache_enabled) = settings.cache_enabled {
            self.cache.enabled = cache_enabled;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        let data_dir = base.join(DEFAULT_DATA_DIR);
        Self {
            storage: StorageConfigRaw::default(),
            cache: CacheConfig::default(),
            storage_resolved: StorageConfig {
                backend: BackendKind::default(),
                database: data_dir.join(DATABASE_FILENAME),
                data_dir,
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.sweep_interval_secs must be greater than 0".to_owned(),
            ));
        }
        if self.storage_resolved.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "storage.data_dir cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configured paths.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.storage.data_dir {
            self.storage.data_dir = Some(expand::expand_env(dir, "storage.data_dir")?);
        }
        if let Some(ref db) = self.storage.database {
            self.storage.database = Some(expand::expand_env(db, "storage.database")?);
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let data_dir = config_dir.join(
            self.storage
                .data_dir
                .as_deref()
                .unwrap_or(DEFAULT_DATA_DIR),
        );
        let database = match &self.storage.database {
            Some(db) => config_dir.join(db),
            None => data_dir.join(DATABASE_FILENAME),
        };

        self.storage_resolved = StorageConfig {
            backend: self.storage.backend.unwrap_or_default(),
            data_dir,
            database,
        };
    }
}
