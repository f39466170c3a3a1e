//! Environment variable secret store

use std::collections::HashMap;
use std::env;

use once_cell::sync::Lazy;

use super::traits::SecretStore;

/// Mapping from logical secret names to environment variable names
static ENV_VAR_MAP: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("gemini", vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
    m.insert("google", vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
    m.insert("openai", vec!["OPENAI_API_KEY"]);
    m.insert("anthropic", vec!["ANTHROPIC_API_KEY"]);
    m.insert("groq", vec!["GROQ_API_KEY"]);
    m.insert("ollama", vec![]); // Ollama doesn't need an API key
    m.insert("langfuse_public_key", vec!["LANGFUSE_PUBLIC_KEY"]);
    m.insert("langfuse_secret_key", vec!["LANGFUSE_SECRET_KEY"]);
    m.insert("langfuse_url", vec!["LANGFUSE_URL", "LANGFUSE_BASEURL", "LANGFUSE_HOST"]);
    m
});

/// Secret store that reads from environment variables
///
/// Logical names are mapped to their conventional variables:
/// - `gemini` → `GEMINI_API_KEY` or `GOOGLE_API_KEY`
/// - `langfuse_public_key` → `LANGFUSE_PUBLIC_KEY`
/// - `langfuse_url` → `LANGFUSE_URL`
/// - anything else → the key itself, then `<KEY>_API_KEY`
///
/// Empty variables are treated as unset.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn new() -> Self {
        Self
    }

    /// Environment variable names checked for a logical key
    pub fn env_vars_for(key: &str) -> Option<&'static [&'static str]> {
        ENV_VAR_MAP.get(key.to_lowercase().as_str()).map(|v| v.as_slice())
    }

    fn read(name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl SecretStore for EnvSecretStore {
    fn name(&self) -> &str {
        "env"
    }

    fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = Self::read(key) {
            return Some(value);
        }

        if let Some(env_vars) = Self::env_vars_for(key) {
            if let Some(value) = env_vars.iter().find_map(|var| Self::read(var)) {
                return Some(value);
            }
        }

        Self::read(&format!("{}_API_KEY", key.to_uppercase()))
    }
}
