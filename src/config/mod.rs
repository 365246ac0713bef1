//! Ambient configuration (component L): `config.toml` under the user's
//! config directory, holding per-environment URL overrides and secret
//! pointers.

pub mod manager;
pub mod models;

pub use manager::{get_config_dir, ConfigManager};
pub use models::{EnvironmentConfig, GlobalConfig, SecretSource, StoredSecret};
