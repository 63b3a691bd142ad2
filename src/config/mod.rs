// src/config/mod.rs
mod schema;

use std::path::{Path, PathBuf};
use config::{Config as ConfigLoader, FileFormat};
use tracing::{info, warn};

pub use schema::{
    Config, GlobalConfig, HttpConfig, WebsiteConfig, FilingsConfig, EmailConfig,
    DomainConfig, LinkedInConfig, TwitterConfig, CacheConfig, IntegrationConfig,
    DiscoveryConfig, HarnessConfig,
};

use crate::error::{FinderResult, FinderError};

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Environment variable prefix, e.g. `SOCIAL_FINDER_TWITTER__BEARER_TOKEN`
pub const ENV_PREFIX: &str = "SOCIAL_FINDER";

impl GlobalConfig {
    /// Anchor a relative path at the data directory
    pub fn data_path(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.data_dir.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

impl Config {
    /// Load configuration from a file or fall back to the built-in defaults
    pub fn load(config_path: Option<&Path>) -> FinderResult<Self> {
        info!("Loading configuration");

        let mut config_builder = ConfigLoader::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        // User-provided configuration
        if let Some(path) = config_path {
            if path.exists() {
                config_builder = config_builder.add_source(config::File::from(path));
                info!("Loading user configuration from: {}", path.display());
            } else {
                warn!("Specified configuration file not found: {}", path.display());
            }
        } else {
            let default_path = Self::get_default_config_path();
            if default_path.exists() {
                config_builder = config_builder.add_source(config::File::from(default_path.as_path()));
                info!("Loading default configuration from: {}", default_path.display());
            } else {
                info!("No existing configuration found, using built-in defaults");
            }
        }

        config_builder = config_builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
        );

        let mut config: Config = config_builder
            .build()
            .map_err(|e| FinderError::ConfigError(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| FinderError::ConfigError(format!("Failed to parse configuration: {}", e)))?;

        config.resolve_paths();
        Ok(config)
    }

    /// Parse configuration from a TOML string layered over the defaults
    pub fn from_toml_str(toml: &str) -> FinderResult<Self> {
        let mut config: Config = ConfigLoader::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.resolve_paths();
        Ok(config)
    }

    /// Relative data directories live under the user's home directory,
    /// relative harness artifacts under the data directory
    fn resolve_paths(&mut self) {
        if self.global.data_dir.is_relative() {
            let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            self.global.data_dir = home_dir.join(&self.global.data_dir);
        }

        self.harness.samples_dir = self.global.data_path(&self.harness.samples_dir);
        self.harness.report_path = self.global.data_path(&self.harness.report_path);
    }

    /// Get the default configuration path
    pub fn get_default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".social-finder/config.toml")
    }

    /// Initialize a new configuration file with the defaults
    pub fn init(force: bool) -> FinderResult<PathBuf> {
        let config_path = Self::get_default_config_path();
        Self::init_at(&config_path, force)?;
        Ok(config_path)
    }

    /// Write the defaults to `config_path`, refusing to overwrite unless forced
    pub fn init_at(config_path: &Path, force: bool) -> FinderResult<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FinderError::file(parent, format!("Failed to create directory: {}", e)))?;
        }

        if config_path.exists() && !force {
            return Err(FinderError::ConfigError(
                format!("Configuration already exists at {}. Use --force to overwrite.", config_path.display())
            ));
        }

        Config::default().save(config_path)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> FinderResult<()> {
        let config_str = toml::to_string_pretty(self)?;

        std::fs::write(path, config_str)
            .map_err(|e| FinderError::file(path, format!("Failed to write configuration: {}", e)))?;

        info!("Configuration saved to {}", path.display());

        Ok(())
    }
}
