//! `ConfigManager` (component L): reads and writes `config.toml` under the
//! user's config directory, holding per-environment URL overrides and
//! secret pointers. Mirrors the teacher's atomic-write-then-rename pattern
//! for every mutation.

use crate::constants::CONFIG_FILENAME;
use crate::error::Error;
use crate::fs::{FileSystem, OsFileSystem};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::models::{EnvironmentConfig, GlobalConfig, StoredSecret};

pub struct ConfigManager<F: FileSystem> {
    fs: F,
    config_dir: PathBuf,
}

impl ConfigManager<OsFileSystem> {
    /// # Errors
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, Error> {
        let config_dir = get_config_dir()?;
        Ok(Self {
            fs: OsFileSystem,
            config_dir,
        })
    }
}

impl<F: FileSystem> ConfigManager<F> {
    pub const fn with_fs(fs: F, config_dir: PathBuf) -> Self {
        Self { fs, config_dir }
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// # Errors
    /// Returns an error if `config.toml` exists but fails to parse.
    pub fn load_global_config(&self) -> Result<GlobalConfig, Error> {
        let config_path = self.config_dir.join(CONFIG_FILENAME);
        if self.fs.exists(&config_path) {
            let content = self.fs.read_to_string(&config_path).map_err(Error::Io)?;
            toml::from_str(&content).map_err(|e| Error::config(format!("invalid config.toml: {e}")))
        } else {
            Ok(GlobalConfig::default())
        }
    }

    /// # Errors
    /// Returns an error if the config directory cannot be created, the
    /// config cannot be serialized, or the write fails.
    pub fn save_global_config(&self, config: &GlobalConfig) -> Result<(), Error> {
        let config_path = self.config_dir.join(CONFIG_FILENAME);
        self.fs.create_dir_all(&self.config_dir).map_err(Error::Io)?;
        let content = toml::to_string_pretty(config)
            .map_err(|e| Error::config(format!("failed to serialize config: {e}")))?;
        crate::atomic::atomic_write_sync(&config_path, content.as_bytes()).map_err(Error::Io)?;
        Ok(())
    }

    /// Sets the base URL override for `collection_name` under `environment`.
    ///
    /// # Errors
    /// Propagates load/save failures.
    pub fn set_url(&self, collection_name: &str, environment: &str, url: &str) -> Result<(), Error> {
        let mut config = self.load_global_config()?;
        let env_config = config
            .environments
            .entry(environment.to_string())
            .or_insert_with(EnvironmentConfig::default);
        env_config
            .base_url_overrides
            .insert(collection_name.to_string(), url.to_string());
        self.save_global_config(&config)
    }

    /// Gets the base URL override for `collection_name` under `environment`,
    /// if one has been set.
    ///
    /// # Errors
    /// Propagates a load failure.
    pub fn get_url(&self, collection_name: &str, environment: &str) -> Result<Option<String>, Error> {
        let config = self.load_global_config()?;
        Ok(config
            .environments
            .get(environment)
            .and_then(|e| e.base_url_overrides.get(collection_name))
            .cloned())
    }

    /// Lists all configured URL overrides, keyed by environment name.
    ///
    /// # Errors
    /// Propagates a load failure.
    pub fn list_urls(&self) -> Result<HashMap<String, HashMap<String, String>>, Error> {
        let config = self.load_global_config()?;
        Ok(config
            .environments
            .into_iter()
            .map(|(env, cfg)| (env, cfg.base_url_overrides))
            .collect())
    }

    /// Records a pointer to a secret (never the value itself) for
    /// `collection_name` under `environment`.
    ///
    /// # Errors
    /// Propagates load/save failures.
    pub fn set_secret(
        &self,
        collection_name: &str,
        environment: &str,
        key: &str,
        secret: StoredSecret,
    ) -> Result<(), Error> {
        let mut config = self.load_global_config()?;
        let env_config = config
            .environments
            .entry(environment.to_string())
            .or_insert_with(EnvironmentConfig::default);
        env_config
            .secrets
            .insert(format!("{collection_name}::{key}"), secret);
        self.save_global_config(&config)
    }

    /// Resolves every stored secret's current value for `environment`,
    /// used to seed `logging::SecretContext` before a run.
    ///
    /// # Errors
    /// Propagates a load failure.
    pub fn resolve_secrets(&self, environment: &str) -> Result<Vec<String>, Error> {
        let config = self.load_global_config()?;
        Ok(config
            .environments
            .get(environment)
            .map(|e| e.secrets.values().filter_map(StoredSecret::resolve).collect())
            .unwrap_or_default())
    }
}

/// Resolves the config directory: `$RUNNER_CONFIG_DIR` if set, else the
/// platform config directory joined with `runner`.
///
/// # Errors
/// Returns an error if neither is resolvable (no home directory).
pub fn get_config_dir() -> Result<PathBuf, Error> {
    if let Ok(dir) = std::env::var(crate::constants::ENV_RUNNER_CONFIG_DIR) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|d| d.join("runner"))
        .ok_or_else(|| Error::config("could not determine a config directory (no home directory found)"))
}
