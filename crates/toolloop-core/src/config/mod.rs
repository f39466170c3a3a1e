//! Configuration
//!
//! - [`AppConfig`]: provider, tracing and turn settings
//! - [`ConfigFile`]: YAML file (user level or explicit path)
//! - `TOOLLOOP_*` environment overrides, applied by [`load_config`]

mod error;
mod file;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use file::{load_config, load_config_with, ConfigFile, ConfigLevel, CONFIG_DIR_NAME, CONFIG_FILE_NAME};
pub use settings::{
    env_var, AppConfig, ProviderSettings, TracingSettings, TurnSettings, ENV_API_BASE, ENV_MAX_ROUNDS,
    ENV_MODEL, ENV_PROVIDER, ENV_TIMEOUT_SECS,
};
