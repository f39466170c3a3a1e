//! Provider trait definition

use std::time::Duration;

use async_trait::async_trait;

use crate::session::Conversation;
use crate::types::{ModelResponse, ToolDeclaration};

use super::error::TransportResult;

/// Connection timeout for provider HTTP clients
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Model configuration for provider requests
#[derive(Clone, Default)]
pub struct ProviderModelConfig {
    /// Model identifier as used by the provider's API
    pub model: String,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

impl ProviderModelConfig {
    /// Create a new model config
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            api_base: None,
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the API base URL
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }
}

impl std::fmt::Debug for ProviderModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderModelConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Model client adapter
///
/// Each provider translates the conversation and tool declarations into its
/// own request format and normalizes the reply into a [`ModelResponse`].
/// Implementations never retry; a failed send is returned to the caller.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name (e.g., "gemini", "ollama")
    fn name(&self) -> &str;

    /// Get the default API base URL
    fn default_api_base(&self) -> &str;

    /// Model this provider sends to
    fn model(&self) -> &str;

    /// Send the conversation and return the normalized response
    async fn send(
        &self,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> TransportResult<ModelResponse>;

    /// Get the API base URL, using custom if provided
    fn get_api_base(&self, model: &ProviderModelConfig) -> String {
        model
            .api_base
            .clone()
            .unwrap_or_else(|| self.default_api_base().to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

/// HTTP client shared by the REST providers
pub(crate) fn http_client() -> TransportResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_key() {
        let config = ProviderModelConfig::new("gemini-2.0-flash").with_api_key("secret-key");
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret-key"));
    }
}
