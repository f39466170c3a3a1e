//! Gemini REST adapter
//!
//! Talks to `generateContent` directly. Gemini reports tool calls as
//! `functionCall` parts and expects results back as `functionResponse`
//! parts, with the assistant role spelled `model`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::logging::SharedLogger;
use crate::session::Conversation;
use crate::types::{
    ChatMessage, MessageRole, ModelResponse, TokenUsage, ToolCallRequest, ToolDeclaration,
};

use super::error::{TransportError, TransportResult};
use super::traits::{http_client, Provider, ProviderModelConfig};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini `generateContent` client
pub struct GeminiProvider {
    config: ProviderModelConfig,
    api_key: String,
    http: reqwest::Client,
    logger: SharedLogger,
}

impl GeminiProvider {
    /// Create a Gemini provider. The config must carry an API key.
    pub fn new(config: ProviderModelConfig, logger: SharedLogger) -> TransportResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| TransportError::missing_api_key("gemini"))?;
        Ok(Self {
            config,
            api_key,
            http: http_client()?,
            logger,
        })
    }

    pub(crate) fn api_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.get_api_base(&self.config),
            self.config.model
        )
    }

    /// Build the JSON request body
    pub(crate) fn build_request_body(
        &self,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> Value {
        let messages = conversation.request_messages();
        let mut contents: Vec<(&'static str, Vec<Value>)> = Vec::new();
        let mut system_parts = Vec::new();

        for msg in &messages {
            let (role, parts) = match msg.role {
                MessageRole::System => {
                    system_parts.push(json!({ "text": msg.text() }));
                    continue;
                }
                MessageRole::User => ("user", vec![json!({ "text": msg.text() })]),
                MessageRole::Assistant => ("model", model_parts(msg)),
                MessageRole::Tool => ("user", function_response_parts(msg)),
            };
            // Gemini rejects empty text parts; an assistant turn with nothing to say is dropped
            if parts.is_empty() {
                continue;
            }

            // Gemini wants alternating turns; merge consecutive same-role contents
            if let Some((last_role, last_parts)) = contents.last_mut() {
                if *last_role == role {
                    last_parts.extend(parts);
                    continue;
                }
            }
            contents.push((role, parts));
        }

        let contents: Vec<Value> = contents
            .into_iter()
            .map(|(role, parts)| json!({ "role": role, "parts": parts }))
            .collect();

        let mut body = json!({ "contents": contents });

        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({ "parts": system_parts });
        }

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools.iter().map(to_gemini_declaration).collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }

    /// Normalize a `generateContent` response
    pub(crate) fn parse_response(&self, json: Value) -> TransportResult<ModelResponse> {
        let candidates = match json["candidates"].as_array() {
            Some(c) if !c.is_empty() => c,
            _ => {
                let reason = json["promptFeedback"]["blockReason"]
                    .as_str()
                    .map(|r| format!("prompt blocked: {}", r))
                    .unwrap_or_else(|| "no candidates in response".to_string());
                return Err(TransportError::invalid_response("gemini", reason));
            }
        };

        let parts = candidates[0]["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for part in &parts {
            if let Some(t) = part["text"].as_str() {
                text.push_str(t);
            }
            if let Some(fc) = part.get("functionCall") {
                let name = fc["name"].as_str().unwrap_or_default().to_string();
                let arguments = match fc.get("args") {
                    Some(Value::Null) | None => json!({}),
                    Some(args) => args.clone(),
                };
                let call = match fc["id"].as_str() {
                    Some(id) => ToolCallRequest::new(id, name, arguments),
                    None => ToolCallRequest::generated(name, arguments),
                };
                tool_calls.push(call);
            }
        }

        let mut response = ModelResponse::with_tool_calls(text, tool_calls);
        if let Some(meta) = json.get("usageMetadata") {
            response = response.with_usage(TokenUsage {
                input_tokens: meta["promptTokenCount"].as_u64().unwrap_or(0),
                output_tokens: meta["candidatesTokenCount"].as_u64().unwrap_or(0),
            });
        }
        Ok(response)
    }
}

fn to_gemini_declaration(tool: &ToolDeclaration) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": tool.parameters.to_json_schema(),
    })
}

fn model_parts(msg: &ChatMessage) -> Vec<Value> {
    let mut parts = Vec::new();
    let text = msg.text();
    if !text.is_empty() {
        parts.push(json!({ "text": text }));
    }
    for call in msg.tool_calls() {
        parts.push(json!({
            "functionCall": { "name": call.name, "args": call.arguments }
        }));
    }
    parts
}

fn function_response_parts(msg: &ChatMessage) -> Vec<Value> {
    match msg.tool_result_part() {
        Some(result) => {
            // functionResponse.response must be an object
            let response = match result.payload() {
                Value::Object(map) => Value::Object(map),
                other => json!({ "result": other }),
            };
            vec![json!({
                "functionResponse": { "name": result.name(), "response": response }
            })]
        }
        None => vec![json!({ "text": msg.text() })],
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn default_api_base(&self) -> &str {
        GEMINI_API_BASE
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(
        &self,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> TransportResult<ModelResponse> {
        let body = self.build_request_body(conversation, tools);
        self.logger.debug(&format!(
            "[GeminiProvider] generateContent: model={}, messages={}, tools={}",
            self.config.model,
            conversation.len(),
            tools.len()
        ));

        let response = self
            .http
            .post(self.api_url())
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            self.logger.error(&format!(
                "[GeminiProvider] HTTP {}: {}",
                status.as_u16(),
                text
            ));
            return Err(TransportError::from_status("gemini", status.as_u16(), text));
        }

        let json: Value = response.json().await?;
        self.parse_response(json)
    }
}
