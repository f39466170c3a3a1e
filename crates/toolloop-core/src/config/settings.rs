//! Application settings
//!
//! Values come from the YAML config file, then `TOOLLOOP_*` environment
//! overrides read as plain variables. Credentials may be set in the file but
//! are normally read from a [`SecretStore`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observe::{LangfuseConfig, DEFAULT_FLUSH_AT, DEFAULT_LANGFUSE_URL};
use crate::providers::{ProviderModelConfig, GEMINI_DEFAULT_MODEL};
use crate::secrets::SecretStore;
use crate::turn::TurnOptions;

use super::error::{ConfigError, ConfigResult};

pub const ENV_PROVIDER: &str = "TOOLLOOP_PROVIDER";
pub const ENV_MODEL: &str = "TOOLLOOP_MODEL";
pub const ENV_API_BASE: &str = "TOOLLOOP_API_BASE";
pub const ENV_MAX_ROUNDS: &str = "TOOLLOOP_MAX_ROUNDS";
pub const ENV_TIMEOUT_SECS: &str = "TOOLLOOP_TIMEOUT_SECS";

/// Read a non-secret setting from the process environment; blank means unset
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Which model to talk to
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Provider ID (`gemini`, `ollama`, `openai`, `mock`, ...)
    pub kind: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: "gemini".to_string(),
            model: GEMINI_DEFAULT_MODEL.to_string(),
            api_base: None,
            api_key: None,
        }
    }
}

impl ProviderSettings {
    pub fn model_config(&self) -> ProviderModelConfig {
        ProviderModelConfig {
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Langfuse tracing
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingSettings {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    pub flush_at: usize,
    /// Recorded as `environment` metadata on every trace
    pub environment: String,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            public_key: None,
            secret_key: None,
            flush_at: DEFAULT_FLUSH_AT,
            environment: "development".to_string(),
        }
    }
}

impl TracingSettings {
    /// Langfuse connection, or `None` when disabled or keys are missing
    ///
    /// Keys set in the file win over the secret store.
    pub fn langfuse_config(&self, secrets: &dyn SecretStore) -> Option<LangfuseConfig> {
        if !self.enabled {
            return None;
        }
        let public_key = self
            .public_key
            .clone()
            .or_else(|| secrets.get("langfuse_public_key"))?;
        let secret_key = self
            .secret_key
            .clone()
            .or_else(|| secrets.get("langfuse_secret_key"))?;
        let base_url = self
            .base_url
            .clone()
            .or_else(|| secrets.get("langfuse_url"))
            .unwrap_or_else(|| DEFAULT_LANGFUSE_URL.to_string());

        Some(LangfuseConfig::new(base_url, public_key, secret_key).with_flush_at(self.flush_at))
    }
}

impl std::fmt::Debug for TracingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingSettings")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("public_key", &self.public_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("flush_at", &self.flush_at)
            .field("environment", &self.environment)
            .finish()
    }
}

/// Tool-call loop limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnSettings {
    pub max_rounds: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
    pub validate_arguments: bool,
}

impl Default for TurnSettings {
    fn default() -> Self {
        let defaults = TurnOptions::default();
        Self {
            max_rounds: defaults.max_rounds,
            timeout_secs: None,
            validate_arguments: defaults.validate_arguments,
        }
    }
}

impl TurnSettings {
    pub fn options(&self) -> TurnOptions {
        let mut options = TurnOptions::default()
            .with_max_rounds(self.max_rounds)
            .with_validation(self.validate_arguments);
        // Out-of-range values are rejected by `AppConfig::validate`
        if let Some(limit) = self.timeout_secs.and_then(|s| Duration::try_from_secs_f64(s).ok()) {
            options = options.with_send_timeout(limit);
        }
        options
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderSettings,
    pub tracing: TracingSettings,
    pub turn: TurnSettings,
}

impl AppConfig {
    /// Defaults for a given provider and model
    pub fn for_provider(kind: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: ProviderSettings {
                kind: kind.into(),
                model: model.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Apply `TOOLLOOP_*` overrides from the process environment
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_overrides(env_var)
    }

    /// Apply `TOOLLOOP_*` overrides produced by `lookup`
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        if let Some(kind) = lookup(ENV_PROVIDER) {
            self.provider.kind = kind.to_lowercase();
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.provider.model = model;
        }
        if let Some(base) = lookup(ENV_API_BASE) {
            self.provider.api_base = Some(base);
        }
        if let Some(raw) = lookup(ENV_MAX_ROUNDS) {
            self.turn.max_rounds = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_MAX_ROUNDS, &raw, "expected a positive integer"))?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: f64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_TIMEOUT_SECS, &raw, "expected seconds"))?;
            self.turn.timeout_secs = Some(secs);
        }
        self.validate()
    }

    /// Reject values the loop cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.provider.kind.trim().is_empty() {
            return Err(ConfigError::invalid("provider.kind", "", "must not be empty"));
        }
        if self.turn.max_rounds == 0 {
            return Err(ConfigError::invalid("turn.max_rounds", "0", "must be at least 1"));
        }
        if let Some(secs) = self.turn.timeout_secs {
            if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigError::invalid(
                    "turn.timeout_secs",
                    secs.to_string(),
                    "must be a positive number of seconds",
                ));
            }
        }
        if self.tracing.flush_at == 0 {
            return Err(ConfigError::invalid("tracing.flush_at", "0", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecretStore;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.provider.kind, "gemini");
        assert_eq!(config.provider.model, "gemini-2.0-flash");
        assert_eq!(config.turn.max_rounds, 1);
        assert!(config.turn.validate_arguments);
        assert_eq!(config.tracing.environment, "development");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env = vars(&[
            (ENV_PROVIDER, "Ollama"),
            (ENV_MODEL, "qwen2.5:3b"),
            (ENV_API_BASE, "http://192.168.29.73:8080"),
            (ENV_MAX_ROUNDS, "3"),
            (ENV_TIMEOUT_SECS, "2.5"),
        ]);

        let mut config = AppConfig::default();
        config.apply_overrides(env).unwrap();

        assert_eq!(config.provider.kind, "ollama");
        assert_eq!(config.provider.model_config().api_base.as_deref(), Some("http://192.168.29.73:8080"));
        let options = config.turn.options();
        assert_eq!(options.max_rounds, 3);
        assert_eq!(options.send_timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_bad_env_value() {
        let err = AppConfig::default()
            .apply_overrides(vars(&[(ENV_MAX_ROUNDS, "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_ROUNDS));

        assert!(matches!(
            AppConfig::default().apply_overrides(vars(&[(ENV_MAX_ROUNDS, "0")])),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unrepresentable_timeout_is_rejected() {
        for raw in ["1e20", "-1", "0", "inf", "NaN"] {
            let result = AppConfig::default().apply_overrides(vars(&[(ENV_TIMEOUT_SECS, raw)]));
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { .. })),
                "{} should be rejected",
                raw
            );
        }

        let settings = TurnSettings {
            timeout_secs: Some(1e20),
            ..Default::default()
        };
        assert_eq!(settings.options().send_timeout, None);
    }

    #[test]
    fn test_overrides_read_exact_names() {
        let seen = std::cell::RefCell::new(Vec::new());
        AppConfig::default()
            .apply_overrides(|name: &str| {
                seen.borrow_mut().push(name.to_string());
                None
            })
            .unwrap();
        let seen = seen.into_inner();
        assert_eq!(
            seen,
            vec![ENV_PROVIDER, ENV_MODEL, ENV_API_BASE, ENV_MAX_ROUNDS, ENV_TIMEOUT_SECS]
        );
        assert!(env_var("TOOLLOOP_TEST_UNSET_VARIABLE").is_none());
    }

    #[test]
    fn test_langfuse_config_sources() {
        let secrets = MemorySecretStore::new()
            .with("langfuse_public_key", "pk-env")
            .with("langfuse_secret_key", "sk-env");

        let mut tracing = TracingSettings::default();
        let config = tracing.langfuse_config(&secrets).unwrap();
        assert_eq!(config.public_key, "pk-env");
        assert_eq!(config.base_url, DEFAULT_LANGFUSE_URL);

        tracing.public_key = Some("pk-file".to_string());
        tracing.base_url = Some("http://localhost:3000".to_string());
        let config = tracing.langfuse_config(&secrets).unwrap();
        assert_eq!(config.public_key, "pk-file");
        assert_eq!(config.base_url, "http://localhost:3000");

        tracing.enabled = false;
        assert!(tracing.langfuse_config(&secrets).is_none());
        assert!(TracingSettings::default()
            .langfuse_config(&MemorySecretStore::new())
            .is_none());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("AIza-secret".to_string());
        config.tracing.secret_key = Some("sk-lf-secret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("AIza-secret"));
        assert!(!rendered.contains("sk-lf-secret"));
    }
}
