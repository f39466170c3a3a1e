//! Conversions between toolloop types and genai types
//!
//! Auth flows through the configured [`SecretStore`], not genai's default
//! env var lookup, so every provider resolves keys the same way.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use genai::chat::{
    ChatMessage as GenaiMessage, ChatOptions as GenaiOptions, MessageContent as GenaiContent,
    Tool as GenaiTool, ToolCall as GenaiToolCall,
};
use genai::resolver::{AuthData, AuthResolver, Endpoint, ServiceTargetResolver};
use genai::{adapter::AdapterKind, Client, ModelIden, ServiceTarget};

use crate::secrets::SecretStore;
use crate::types::{ChatMessage, MessageRole, ToolCallRequest, ToolDeclaration};

use super::traits::ProviderModelConfig;

/// Flatten a message into the text genai sends
///
/// Tool calls and tool results are rendered inline so every genai backend
/// sees the full exchange, whatever its native tool message support.
pub fn flatten_text(msg: &ChatMessage) -> String {
    match msg.role {
        MessageRole::Tool => match msg.tool_result_part() {
            Some(result) => format!(
                "[Tool result for {}]: {}",
                result.name(),
                result.payload_text()
            ),
            None => msg.text(),
        },
        MessageRole::Assistant => {
            let mut lines = Vec::new();
            let text = msg.text();
            if !text.is_empty() {
                lines.push(text);
            }
            for call in msg.tool_calls() {
                lines.push(format!("[Called tool {} with {}]", call.name, call.arguments));
            }
            lines.join("\n")
        }
        _ => msg.text(),
    }
}

pub fn to_genai_message(msg: &ChatMessage) -> GenaiMessage {
    let content = GenaiContent::from(flatten_text(msg));
    match msg.role {
        MessageRole::System => GenaiMessage::system(content),
        MessageRole::User | MessageRole::Tool => GenaiMessage::user(content),
        MessageRole::Assistant => GenaiMessage::assistant(content),
    }
}

pub fn to_genai_messages(messages: &[ChatMessage]) -> Vec<GenaiMessage> {
    messages.iter().map(to_genai_message).collect()
}

pub fn to_genai_tool(tool: &ToolDeclaration) -> GenaiTool {
    GenaiTool::new(&tool.name)
        .with_description(&tool.description)
        .with_schema(tool.parameters.to_json_schema())
}

pub fn to_genai_tools(tools: &[ToolDeclaration]) -> Vec<GenaiTool> {
    tools.iter().map(to_genai_tool).collect()
}

/// Chat options for a single non-interactive send
pub fn to_genai_options() -> GenaiOptions {
    // Tool calls are only reported at stream end when capture is on
    GenaiOptions::default().with_capture_tool_calls(true)
}

pub fn from_genai_tool_call(tc: &GenaiToolCall) -> ToolCallRequest {
    if tc.call_id.is_empty() {
        ToolCallRequest::generated(tc.fn_name.clone(), tc.fn_arguments.clone())
    } else {
        ToolCallRequest::new(tc.call_id.clone(), tc.fn_name.clone(), tc.fn_arguments.clone())
    }
}

/// Check if a provider is natively supported by genai
pub fn is_genai_native(provider: &str) -> bool {
    matches!(
        provider.to_lowercase().as_str(),
        "openai"
            | "anthropic"
            | "groq"
            | "xai"
            | "deepseek"
            | "cohere"
            | "fireworks"
            | "together"
    )
}

/// Check if a provider can be handled by genai (native or via OpenAI-compat)
pub fn is_genai_supported(provider: &str) -> bool {
    is_genai_native(provider)
        || matches!(
            provider.to_lowercase().as_str(),
            "azure" | "openrouter" | "mistral"
        )
}

fn with_trailing_slash(base: &str) -> String {
    format!("{}/", base.trim_end_matches('/'))
}

/// Create a genai Client with custom auth and endpoint resolution
pub fn create_client(
    provider: &str,
    config: &ProviderModelConfig,
    secrets: Arc<dyn SecretStore>,
) -> Client {
    let auth_provider = provider.to_string();
    let auth_explicit_key = config.api_key.clone();

    let auth_resolver = AuthResolver::from_resolver_async_fn(
        move |_model_iden: ModelIden| -> Pin<Box<dyn Future<Output = genai::resolver::Result<Option<AuthData>>> + Send>> {
            let provider = auth_provider.clone();
            let explicit_key = auth_explicit_key.clone();
            let secrets = Arc::clone(&secrets);

            Box::pin(async move {
                if let Some(key) = explicit_key {
                    return Ok(Some(AuthData::from_single(key)));
                }
                Ok(secrets.get(&provider).map(AuthData::from_single))
            })
        },
    );

    let target_provider = provider.to_lowercase();
    let target_api_base = config.api_base.clone();

    let target_resolver = ServiceTargetResolver::from_resolver_fn(
        move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let endpoint = match (target_provider.as_str(), target_api_base.as_deref()) {
                (_, Some(base)) => Endpoint::from_owned(with_trailing_slash(base)),
                ("openrouter", None) => Endpoint::from_static("https://openrouter.ai/api/v1/"),
                ("mistral", None) => Endpoint::from_static("https://api.mistral.ai/v1/"),
                _ => return Ok(target),
            };

            // Non-native providers speak the OpenAI protocol
            let adapter_kind = if is_genai_native(&target_provider) {
                target.model.adapter_kind
            } else {
                AdapterKind::OpenAI
            };
            let model = ModelIden::new(adapter_kind, target.model.model_name.clone());

            Ok(ServiceTarget {
                endpoint,
                auth: target.auth,
                model,
            })
        },
    );

    Client::builder()
        .with_auth_resolver(auth_resolver)
        .with_service_target_resolver(target_resolver)
        .build()
}
