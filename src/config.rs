//! Configuration System
//!
//! Layered configuration: built-in defaults, the global config file, the
//! workspace's `.strata/config.toml`, then `STRATA_*` environment variables.
//! Later layers override earlier ones key by key.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::repository::DEFAULT_MAX_ORDER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;
pub use sources::workspace_file::workspace_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub reader: ReaderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Module order bound for newly created repositories.
    #[serde(default = "default_max_order")]
    pub max_order: usize,
}

fn default_max_order() -> usize {
    DEFAULT_MAX_ORDER
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_order: default_max_order(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store directory; relative paths resolve against the workspace root.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".strata/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

impl StorageConfig {
    pub fn resolve(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

/// Settings for reading directories into artifact trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// File or directory names skipped while reading.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_ignore() -> Vec<String> {
    vec![".strata".to_string(), ".git".to_string()]
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            ignore: default_ignore(),
            follow_symlinks: false,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Repository(String),
    Storage(String),
    Reader(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Repository(msg) => write!(f, "repository: {}", msg),
            ValidationError::Storage(msg) => write!(f, "storage: {}", msg),
            ValidationError::Reader(msg) => write!(f, "reader: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Order bounds past this make the module powerset impractically large.
const MAX_ORDER_LIMIT: usize = 8;

impl StrataConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.repository.max_order > MAX_ORDER_LIMIT {
            errors.push(ValidationError::Repository(format!(
                "max_order {} exceeds the limit of {}",
                self.repository.max_order, MAX_ORDER_LIMIT
            )));
        }
        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "store path cannot be empty".to_string(),
            ));
        }
        if self.reader.ignore.iter().any(|p| p.trim().is_empty()) {
            errors.push(ValidationError::Reader(
                "ignore patterns cannot be empty".to_string(),
            ));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`StrataConfig`] from its layered sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_file: Option<PathBuf>,
    environment: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            global_file: global_config_path(),
            environment: true,
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the global config file location; `None` skips it.
    pub fn with_global_file(mut self, path: Option<PathBuf>) -> Self {
        self.global_file = path;
        self
    }

    /// Whether `STRATA_*` environment variables are consulted.
    pub fn with_environment(mut self, enabled: bool) -> Self {
        self.environment = enabled;
        self
    }

    /// Load and validate configuration for a workspace.
    pub fn load(&self, workspace_root: &Path) -> Result<StrataConfig, ApiError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder, self.global_file.as_deref())?;
        builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        if self.environment {
            builder = sources::environment::add_to_builder(builder);
        }

        let config: StrataConfig = builder.build()?.try_deserialize()?;
        check(&config)?;
        debug!(
            workspace = %workspace_root.display(),
            max_order = config.repository.max_order,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load and validate a single TOML file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<StrataConfig, ApiError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ApiError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: StrataConfig = toml::from_str(&contents).map_err(|e| {
            ApiError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        check(&config)?;
        Ok(config)
    }
}

fn check(config: &StrataConfig) -> Result<(), ApiError> {
    config.validate().map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        ApiError::ConfigError(format!(
            "Configuration validation failed:\n{}",
            messages.join("\n")
        ))
    })
}
