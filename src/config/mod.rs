//! Engine configuration.
//!
//! # Location
//!
//! - Unix/macOS: `~/.tmplver/config.toml`
//! - Windows: `%LOCALAPPDATA%\tmplver\config.toml`
//!
//! # Priority
//!
//! 1. `TMPLVER_DATA_DIR` overrides `data_dir`
//! 2. `TMPLVER_CONFIG` points at a different config file
//! 3. The config file, when it exists
//! 4. Defaults
//!
//! # Format
//!
//! Every field is optional:
//!
//! ```toml
//! data_dir = "/var/lib/tmplver"
//! persist_timeout_ms = 10000
//! max_depth = 32
//! max_fan_out = 64
//! default_actor = "system"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_ACTOR, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FAN_OUT, DEFAULT_PERSIST_TIMEOUT_MS,
};
use crate::core::{EngineError, EngineResult};
use crate::models::ResolveOptions;
use crate::utils::fs::atomic_write;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "TMPLVER_CONFIG";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TMPLVER_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the file backend; templates live under `{data_dir}/templates`
    pub data_dir: PathBuf,
    /// Upper bound for a single load or save
    pub persist_timeout_ms: u64,
    /// Default resolution depth bound
    pub max_depth: usize,
    /// Default per-version declaration bound
    pub max_fan_out: usize,
    /// Actor recorded on audit events of read operations
    pub default_actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let base = base_dir().unwrap_or_else(|_| PathBuf::from(".tmplver"));
        Self {
            data_dir: base.join("data"),
            persist_timeout_ms: DEFAULT_PERSIST_TIMEOUT_MS,
            max_depth: DEFAULT_MAX_DEPTH,
            max_fan_out: DEFAULT_MAX_FAN_OUT,
            default_actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

impl EngineConfig {
    /// Configuration rooted at `data_dir` with every other field defaulted.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load from the process environment and the default location.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigError`] when the file cannot be read,
    /// does not parse, or holds invalid values.
    pub async fn load() -> EngineResult<Self> {
        Self::load_with_env(|key| std::env::var(key).ok()).await
    }

    /// Like [`EngineConfig::load`], reading environment variables through
    /// `lookup`.
    pub async fn load_with_env<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = match lookup(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::default_path().map_err(config_error)?,
        };

        let mut config = if path.exists() {
            Self::load_from(&path).await.map_err(config_error)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        if let Some(dir) = lookup(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a config file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Write this config to `path`, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || atomic_write(&path, content.as_bytes()))
            .await
            .context("Failed to spawn blocking task for config write")?
    }

    /// `config.toml` inside the platform base directory.
    pub fn default_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.toml"))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        let fail = |message: &str| {
            Err(EngineError::ConfigError {
                message: message.to_string(),
            })
        };

        if self.persist_timeout_ms == 0 {
            return fail("persist_timeout_ms must be greater than zero");
        }
        if self.max_depth == 0 {
            return fail("max_depth must be greater than zero");
        }
        if self.max_fan_out == 0 {
            return fail("max_fan_out must be greater than zero");
        }
        if self.default_actor.trim().is_empty() {
            return fail("default_actor must not be empty");
        }
        Ok(())
    }

    #[must_use]
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }

    /// Resolution options carrying the configured bounds.
    #[must_use]
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::default().with_limits(self.max_depth, self.max_fan_out)
    }
}

fn base_dir() -> Result<PathBuf> {
    if cfg!(target_os = "windows") {
        Ok(dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("tmplver"))
    } else {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".tmplver"))
    }
}

fn config_error(error: anyhow::Error) -> EngineError {
    EngineError::ConfigError {
        message: format!("{error:#}"),
    }
}
