//! GenaiProvider - hosted providers through the genai crate
//!
//! Handles OpenAI, Anthropic, Groq and the other genai-supported APIs, plus
//! OpenAI-compatible endpoints (OpenRouter, Mistral, custom bases) via the
//! ServiceTargetResolver. The stream is drained into one [`ModelResponse`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{ChatRequest, ChatStreamEvent};
use genai::Client;

use crate::logging::SharedLogger;
use crate::secrets::SecretStore;
use crate::session::Conversation;
use crate::types::{ModelResponse, ToolDeclaration};

use super::error::{TransportError, TransportResult};
use super::genai_adapter::{
    create_client, from_genai_tool_call, is_genai_supported, to_genai_messages, to_genai_options,
    to_genai_tools,
};
use super::traits::{Provider, ProviderModelConfig};

pub struct GenaiProvider {
    provider_id: String,
    config: ProviderModelConfig,
    client: Client,
    logger: SharedLogger,
}

impl GenaiProvider {
    pub fn new(
        provider_id: impl Into<String>,
        config: ProviderModelConfig,
        secrets: Arc<dyn SecretStore>,
        logger: SharedLogger,
    ) -> Self {
        let provider_id = provider_id.into();
        let client = create_client(&provider_id, &config, secrets);
        Self {
            provider_id,
            config,
            client,
            logger,
        }
    }

    /// Check if this provider can handle the given provider ID
    pub fn supports(provider_id: &str) -> bool {
        is_genai_supported(provider_id)
    }

    /// Extract model name from a model string (e.g., "openai/gpt-4" -> "gpt-4")
    pub fn extract_model_name(model: &str) -> &str {
        model.split('/').nth(1).unwrap_or(model)
    }

    fn api_error(&self, message: impl Into<String>) -> TransportError {
        TransportError::api(self.provider_id.clone(), 500, message)
    }
}

#[async_trait]
impl Provider for GenaiProvider {
    fn name(&self) -> &str {
        &self.provider_id
    }

    fn default_api_base(&self) -> &str {
        match self.provider_id.as_str() {
            "openai" => "https://api.openai.com/v1/",
            "anthropic" => "https://api.anthropic.com/",
            "groq" => "https://api.groq.com/openai/v1/",
            "xai" => "https://api.x.ai/v1/",
            "deepseek" => "https://api.deepseek.com/",
            "cohere" => "https://api.cohere.ai/",
            "fireworks" => "https://api.fireworks.ai/inference/v1/",
            "together" => "https://api.together.xyz/v1/",
            "openrouter" => "https://openrouter.ai/api/v1/",
            "mistral" => "https://api.mistral.ai/v1/",
            _ => "https://api.openai.com/v1/",
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(
        &self,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> TransportResult<ModelResponse> {
        let mut chat_req = ChatRequest::new(to_genai_messages(&conversation.request_messages()));
        if !tools.is_empty() {
            chat_req = chat_req.with_tools(to_genai_tools(tools));
        }

        let options = to_genai_options();
        let model_name = Self::extract_model_name(&self.config.model);
        self.logger.debug(&format!(
            "[GenaiProvider] send: provider={}, model={}",
            self.provider_id, model_name
        ));

        let chat_stream = self
            .client
            .exec_chat_stream(model_name, chat_req, Some(&options))
            .await
            .map_err(|e| self.api_error(e.to_string()))?;

        let mut stream = Box::pin(chat_stream.stream);
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => text.push_str(&chunk.content),
                Ok(ChatStreamEvent::End(end)) => {
                    if let Some(captured) = end.captured_tool_calls() {
                        tool_calls.extend(captured.iter().map(|tc| from_genai_tool_call(tc)));
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    self.logger
                        .error(&format!("[GenaiProvider] Stream error: {}", e));
                    return Err(self.api_error(e.to_string()));
                }
            }
        }

        self.logger.debug(&format!(
            "[GenaiProvider] received {} chars, {} tool calls",
            text.len(),
            tool_calls.len()
        ));
        Ok(ModelResponse::with_tool_calls(text, tool_calls))
    }
}
