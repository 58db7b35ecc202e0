use anyhow::Result;
use market_cache_common::AppConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Resolved configuration with the source path for reloading.
pub struct RuntimeConfig {
    pub config: AppConfig,
    pub config_path: PathBuf,
}

impl RuntimeConfig {
    /// Load from `path`, or fall back to defaults plus environment overrides
    /// when the file does not exist.
    pub fn load(path: &str) -> Result<Self> {
        let config = if Path::new(path).exists() {
            info!(path = path, "loading configuration");
            AppConfig::load(path)?
        } else {
            warn!(path = path, "configuration file not found, using defaults");
            let mut config = AppConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            config
        };

        Ok(Self {
            config,
            config_path: PathBuf::from(path),
        })
    }
}
