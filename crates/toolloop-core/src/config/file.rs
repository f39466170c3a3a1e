//! YAML configuration file
//!
//! The user-level file lives at `~/.config/toolloop/config.yaml`; programs
//! may also point at an explicit path.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::ConfigResult;
use super::settings::{env_var, AppConfig};

pub const CONFIG_DIR_NAME: &str = "toolloop";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Where a config file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (~/.config/toolloop/config.yaml)
    User,
    /// Path given on the command line or by the caller
    Explicit,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Explicit => "explicit",
        }
    }
}

/// A YAML config file on disk
///
/// # Example
///
/// ```no_run
/// use toolloop_core::config::ConfigFile;
///
/// let config = ConfigFile::user().load().unwrap();
/// println!("provider: {}", config.provider.kind);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    level: ConfigLevel,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            level: ConfigLevel::Explicit,
        }
    }

    /// User-level config file
    pub fn user() -> Self {
        // XDG config directory (~/.config on Linux, ~/Library/Application Support on macOS)
        let config_dir = dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
        Self {
            path: config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
            level: ConfigLevel::User,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the file. A missing file yields the defaults.
    pub fn load(&self) -> ConfigResult<AppConfig> {
        if !self.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        let config: AppConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config, creating parent directories
    pub fn save(&self, config: &AppConfig) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_yaml::to_string(config)?)?;
        Ok(())
    }
}

/// Load configuration the way the programs do
///
/// Reads `path` if given, otherwise the user-level file, then applies the
/// `TOOLLOOP_*` environment overrides.
pub fn load_config(path: Option<&Path>) -> ConfigResult<AppConfig> {
    load_config_with(path, env_var)
}

/// Like [`load_config`], with overrides produced by `lookup`
pub fn load_config_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigResult<AppConfig> {
    let file = match path {
        Some(p) => ConfigFile::new(p),
        None => ConfigFile::user(),
    };
    let mut config = file.load()?;
    config.apply_overrides(lookup)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let file = ConfigFile::new(dir.path().join("absent.yaml"));
        assert!(!file.exists());
        assert_eq!(file.load().unwrap(), AppConfig::default());
        assert_eq!(file.level(), ConfigLevel::Explicit);
    }

    #[test]
    fn test_partial_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "provider:\n  kind: ollama\n  model: qwen2.5:3b\n  api_base: http://192.168.29.73:8080\nturn:\n  max_rounds: 4\n",
        )
        .unwrap();

        let config = ConfigFile::new(&path).load().unwrap();
        assert_eq!(config.provider.kind, "ollama");
        assert_eq!(config.provider.api_base.as_deref(), Some("http://192.168.29.73:8080"));
        assert_eq!(config.turn.max_rounds, 4);
        assert!(config.turn.validate_arguments);
        assert!(config.tracing.enabled);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let file = ConfigFile::new(dir.path().join("nested").join("config.yaml"));

        let mut config = AppConfig::for_provider("ollama", "qwen2.5:3b");
        config.turn.timeout_secs = Some(30.0);
        config.tracing.enabled = false;
        file.save(&config).unwrap();

        assert!(file.exists());
        assert_eq!(file.load().unwrap(), config);
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "provider: [not, a, map]\n").unwrap();
        assert!(matches!(ConfigFile::new(&path).load(), Err(ConfigError::Yaml(_))));

        fs::write(&path, "turn:\n  max_rounds: 0\n").unwrap();
        assert!(matches!(
            ConfigFile::new(&path).load(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_config_applies_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "provider:\n  kind: gemini\n").unwrap();

        let lookup = |name: &str| (name == "TOOLLOOP_MODEL").then(|| "gemini-1.5-pro".to_string());
        let config = load_config_with(Some(&path), lookup).unwrap();
        assert_eq!(config.provider.kind, "gemini");
        assert_eq!(config.provider.model, "gemini-1.5-pro");
    }

    #[test]
    fn test_user_path() {
        let file = ConfigFile::user();
        assert_eq!(file.level(), ConfigLevel::User);
        assert!(file.path().ends_with("toolloop/config.yaml"));
    }
}
