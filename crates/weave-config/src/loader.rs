use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use weave_core::{Result, WeaveError};

use crate::schema::WeaveConfig;

/// Loads the weave configuration and holds a shared, swappable snapshot.
pub struct ConfigLoader {
    config: Arc<RwLock<WeaveConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > `WEAVE_CONFIG` env >
    /// `~/.config/weave/weave.toml`.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("WEAVE_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weave")
            .join("weave.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str::<WeaveConfig>(&raw)
                .map_err(|e| WeaveError::Config(format!("failed to parse {}: {}", config_path.display(), e)))?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            WeaveConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => return Err(WeaveError::Config(e)),
        }

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> WeaveConfig {
        self.config.read().clone()
    }

    /// Get a shared reference for subscription.
    pub fn shared(&self) -> Arc<RwLock<WeaveConfig>> {
        Arc::clone(&self.config)
    }

    /// Path being loaded from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (`WEAVE_LLM_MODEL`, `WEAVE_LLM_BASE_URL`,
    /// `WEAVE_LOG`, `WEAVE_WORKER_SOCKET_DIR`).
    fn apply_env_overrides(mut config: WeaveConfig) -> WeaveConfig {
        if let Ok(v) = std::env::var("WEAVE_LLM_MODEL") {
            config.llm.model = v;
        }
        if let Ok(v) = std::env::var("WEAVE_LLM_BASE_URL") {
            config.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("WEAVE_LOG") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("WEAVE_WORKER_SOCKET_DIR") {
            config.worker.socket_dir = v;
        }
        config
    }

    /// Reload the config from disk, replacing the shared snapshot in place.
    pub fn reload(&self) -> Result<()> {
        if !self.config_path.exists() {
            return Err(WeaveError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let raw = std::fs::read_to_string(&self.config_path)?;
        let new_config = toml::from_str::<WeaveConfig>(&raw)
            .map_err(|e| WeaveError::Config(format!("failed to parse {}: {}", self.config_path.display(), e)))?;
        let new_config = Self::apply_env_overrides(new_config);
        *self.config.write() = new_config;
        info!("configuration reloaded");
        Ok(())
    }
}
