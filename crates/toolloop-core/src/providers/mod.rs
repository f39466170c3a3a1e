//! Model client adapters
//!
//! Every provider implements [`Provider::send`]: one request carrying the
//! conversation and tool declarations, one normalized [`ModelResponse`] back.
//!
//! ## Architecture
//!
//! - `gemini` and `ollama` have dedicated REST adapters, since their tool-call
//!   wire shapes differ the most
//! - other hosted providers go through the `genai` crate
//! - `mock` is a scriptable provider for tests and offline runs
//!
//! Auth flows through a [`SecretStore`], never straight from the environment.

mod error;
mod gemini;
mod genai_adapter;
mod genai_provider;
mod mock;
mod ollama;
mod traits;

pub use error::{TransportError, TransportResult};
pub use gemini::{GeminiProvider, GEMINI_API_BASE, GEMINI_DEFAULT_MODEL};
pub use genai_adapter::{is_genai_native, is_genai_supported};
pub use genai_provider::GenaiProvider;
pub use mock::{MockMode, MockProvider, MockReply};
pub use ollama::{OllamaProvider, OLLAMA_API_BASE, OLLAMA_DEFAULT_MODEL};
pub use traits::{Provider, ProviderModelConfig, CONNECT_TIMEOUT};

use std::sync::Arc;

use crate::logging::SharedLogger;
use crate::secrets::SecretStore;

/// Create a provider for the given provider ID
///
/// A missing API key is filled from `secrets` under the provider ID. Gemini
/// fails here when no key can be found; genai providers resolve theirs lazily.
pub fn create_provider(
    provider_id: &str,
    mut config: ProviderModelConfig,
    secrets: Arc<dyn SecretStore>,
    logger: SharedLogger,
) -> TransportResult<Arc<dyn Provider>> {
    let id = provider_id.to_lowercase();
    logger.debug(&format!(
        "[providers] creating provider '{}' for model '{}'",
        id, config.model
    ));

    match id.as_str() {
        "gemini" | "google" => {
            if config.api_key.is_none() {
                config.api_key = secrets.get("gemini");
            }
            Ok(Arc::new(GeminiProvider::new(config, logger)?))
        }
        "ollama" => Ok(Arc::new(OllamaProvider::new(config, logger)?)),
        "mock" => Ok(Arc::new(MockProvider::new(MockMode::Echo, logger))),
        // Unknown IDs are treated as OpenAI-compatible endpoints
        _ => Ok(Arc::new(GenaiProvider::new(id, config, secrets, logger))),
    }
}

/// List all supported provider IDs
pub fn supported_providers() -> Vec<&'static str> {
    vec![
        // Dedicated adapters
        "gemini",
        "ollama",
        // Through genai
        "openai",
        "anthropic",
        "groq",
        "xai",
        "deepseek",
        "cohere",
        "fireworks",
        "together",
        "azure",
        "openrouter",
        "mistral",
        // Testing
        "mock",
    ]
}
