//! Ollama adapter
//!
//! Uses the non-streaming `/api/chat` endpoint of a local or LAN Ollama
//! server. No API key is involved.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::logging::SharedLogger;
use crate::session::Conversation;
use crate::types::{
    ChatMessage, MessageRole, ModelResponse, TokenUsage, ToolCallRequest, ToolDeclaration,
};

use super::error::{TransportError, TransportResult};
use super::traits::{http_client, Provider, ProviderModelConfig};

pub const OLLAMA_API_BASE: &str = "http://localhost:11434";
pub const OLLAMA_DEFAULT_MODEL: &str = "qwen2.5:3b";

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    #[serde(default)]
    id: Option<String>,
    function: OllamaFunction,
}

#[derive(Debug, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Ollama chat client
pub struct OllamaProvider {
    config: ProviderModelConfig,
    http: reqwest::Client,
    logger: SharedLogger,
}

impl OllamaProvider {
    pub fn new(config: ProviderModelConfig, logger: SharedLogger) -> TransportResult<Self> {
        Ok(Self {
            config,
            http: http_client()?,
            logger,
        })
    }

    pub(crate) fn api_url(&self) -> String {
        format!("{}/api/chat", self.get_api_base(&self.config))
    }

    pub(crate) fn build_request_body(
        &self,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> Value {
        let messages: Vec<Value> = conversation
            .request_messages()
            .iter()
            .map(to_ollama_message)
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false,
        });

        if !tools.is_empty() {
            let tools: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters.to_json_schema(),
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }

    pub(crate) fn parse_response(&self, body: &str) -> TransportResult<ModelResponse> {
        let parsed: OllamaChatResponse = serde_json::from_str(body)?;
        let message = parsed
            .message
            .ok_or_else(|| TransportError::invalid_response("ollama", "missing message"))?;

        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|tc| {
                let arguments = match tc.function.arguments {
                    Value::Null => json!({}),
                    // Some models return arguments as a JSON-encoded string
                    Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
                    other => other,
                };
                match tc.id {
                    Some(id) if !id.is_empty() => {
                        ToolCallRequest::new(id, tc.function.name, arguments)
                    }
                    _ => ToolCallRequest::generated(tc.function.name, arguments),
                }
            })
            .collect();

        let mut response = ModelResponse::with_tool_calls(message.content, tool_calls);
        if parsed.prompt_eval_count.is_some() || parsed.eval_count.is_some() {
            response = response.with_usage(TokenUsage {
                input_tokens: parsed.prompt_eval_count.unwrap_or(0),
                output_tokens: parsed.eval_count.unwrap_or(0),
            });
        }
        Ok(response)
    }
}

fn to_ollama_message(msg: &ChatMessage) -> Value {
    match msg.role {
        MessageRole::Assistant => {
            let calls = msg.tool_calls();
            let mut value = json!({ "role": "assistant", "content": msg.text() });
            if !calls.is_empty() {
                value["tool_calls"] = Value::Array(
                    calls
                        .iter()
                        .map(|c| json!({ "function": { "name": c.name, "arguments": c.arguments } }))
                        .collect(),
                );
            }
            value
        }
        MessageRole::Tool => match msg.tool_result_part() {
            Some(result) => json!({
                "role": "tool",
                "content": result.payload_text(),
                "tool_name": result.name(),
            }),
            None => json!({ "role": "tool", "content": msg.text() }),
        },
        role => json!({ "role": role.to_string(), "content": msg.text() }),
    }
}

/// Pull the `error` field out of an Ollama error body when there is one
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_api_base(&self) -> &str {
        OLLAMA_API_BASE
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(
        &self,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> TransportResult<ModelResponse> {
        let url = self.api_url();
        self.logger.debug(&format!(
            "[OllamaProvider] POST {} model={} messages={}",
            url,
            self.config.model,
            conversation.len()
        ));

        let response = self
            .http
            .post(&url)
            .json(&self.build_request_body(conversation, tools))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = error_message(&body);
            self.logger.error(&format!(
                "[OllamaProvider] HTTP {}: {}",
                status.as_u16(),
                message
            ));
            return Err(TransportError::from_status("ollama", status.as_u16(), message));
        }

        self.parse_response(&body)
    }
}
