//! Configuration Loader
//!
//! Environment-aware loading: built-in defaults, then the base file, then
//! the environment overlay, then `FANOUT__*` variables. Files are optional;
//! the result is always validated.

use super::error::{ConfigResult, ConfigurationError};
use super::FanoutConfig;
use crate::constants::env as env_vars;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "fanout";

/// Loaded and validated configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: FanoutConfig,
    environment: String,
    config_directory: PathBuf,
    loaded_files: Vec<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_overrides(config_dir, environment, None)
    }

    /// Like [`load_from_directory_with_env`](Self::load_from_directory_with_env),
    /// but reads `FANOUT__*` overrides from `overrides` instead of the process
    /// environment when given
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let explicit_dir = config_dir.is_some();
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        if explicit_dir && !config_directory.is_dir() {
            return Err(ConfigurationError::config_file_not_found(vec![config_directory
                .display()
                .to_string()]));
        }

        debug!(
            environment = %environment,
            config_directory = %config_directory.display(),
            "Loading configuration"
        );

        let base_file = config_directory.join(format!("{BASE_FILE_STEM}.toml"));
        let environment_file =
            config_directory.join(format!("{BASE_FILE_STEM}.{environment}.toml"));
        let loaded_files: Vec<PathBuf> = [&base_file, &environment_file]
            .into_iter()
            .filter(|path| path.is_file())
            .cloned()
            .collect();

        let defaults = Config::try_from(&FanoutConfig::default())?;
        let environment_overrides = Environment::with_prefix(env_vars::OVERRIDE_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("retry.retryable_errors")
            .try_parsing(true)
            .source(overrides);

        let config: FanoutConfig = Config::builder()
            .add_source(defaults)
            .add_source(Self::file_source(&base_file))
            .add_source(Self::file_source(&environment_file))
            .add_source(environment_overrides)
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = %environment,
            files = ?loaded_files,
            definition = %config.dispatch.definition_name,
            concurrency_cap = config.dispatch.concurrency_cap,
            batch_count = config.dispatch.batch_count,
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
            loaded_files,
        }))
    }

    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }

    /// Effective configuration as JSON
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Files that contributed to the configuration, in load order
    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.loaded_files
    }

    /// FANOUT_ENV, then APP_ENV, else `development`
    pub fn detect_environment() -> String {
        env::var(env_vars::ENVIRONMENT)
            .or_else(|_| env::var(env_vars::APP_ENVIRONMENT))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var(env_vars::CONFIG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn file_source(path: &Path) -> File<config::FileSourceFile, FileFormat> {
        File::from(path).format(FileFormat::Toml).required(false)
    }
}
