//! Ambient configuration models: the on-disk shape of `config.toml` and the
//! per-environment URL/secret overrides it carries (component L).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Deserialize, Serialize)]
pub struct GlobalConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentConfig>,
}

const fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            environments: HashMap::new(),
        }
    }
}

/// One named environment's URL override and stored secrets, keyed by
/// collection name so the same environment file can back several
/// collections.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub base_url_overrides: HashMap<String, String>,
    #[serde(default)]
    pub secrets: HashMap<String, StoredSecret>,
}

/// A secret value is never written to `config.toml` in plaintext; only a
/// pointer to where it lives is persisted.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredSecret {
    pub source: SecretSource,
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SecretSource {
    Env,
}

impl StoredSecret {
    /// Resolves the secret's current value from its source.
    #[must_use]
    pub fn resolve(&self) -> Option<String> {
        match self.source {
            SecretSource::Env => std::env::var(&self.name).ok(),
        }
    }
}
