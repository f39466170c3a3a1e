//! Mock provider for testing
//!
//! Provides deterministic, configurable responses without network dependencies.
//! Scripted replies are chosen from the conversation itself, so replaying the
//! same history always yields the same reply.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::{TransportError, TransportResult};
use super::traits::Provider;
use crate::logging::{NoOpLogger, SharedLogger};
use crate::session::Conversation;
use crate::types::{MessageRole, ModelResponse, ToolCallRequest, ToolDeclaration};

/// One scripted model reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Plain text, no tool calls
    Text(String),
    /// Request tool calls, optionally with accompanying text
    ToolCalls {
        text: String,
        calls: Vec<ToolCallRequest>,
    },
    /// Text describing every tool result since the last user message
    SummarizeToolResults,
    /// Fail the send
    Error(String),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        MockReply::ToolCalls {
            text: String::new(),
            calls,
        }
    }
}

/// Mock response mode
#[derive(Debug, Clone, Default)]
pub enum MockMode {
    /// Echo back the last user message
    #[default]
    Echo,
    /// Return a fixed response
    Fixed(String),
    /// Reply `n` is returned when `n` assistant messages follow the last user message
    Script(Vec<MockReply>),
    /// Every send fails
    Error(String),
}

/// Mock LLM provider for testing
pub struct MockProvider {
    mode: MockMode,
    delay: Option<Duration>,
    sends: AtomicUsize,
    seen_tools: Mutex<Vec<Vec<String>>>,
    logger: SharedLogger,
}

impl MockProvider {
    pub fn new(mode: MockMode, logger: SharedLogger) -> Self {
        Self {
            mode,
            delay: None,
            sends: AtomicUsize::new(0),
            seen_tools: Mutex::new(Vec::new()),
            logger,
        }
    }

    pub fn echo() -> Self {
        Self::new(MockMode::Echo, std::sync::Arc::new(NoOpLogger))
    }

    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(
            MockMode::Fixed(response.into()),
            std::sync::Arc::new(NoOpLogger),
        )
    }

    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self::new(MockMode::Script(replies), std::sync::Arc::new(NoOpLogger))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            MockMode::Error(message.into()),
            std::sync::Arc::new(NoOpLogger),
        )
    }

    /// Sleep before answering each send
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of sends received so far
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Tool names declared on each send, in send order
    pub fn seen_tools(&self) -> Vec<Vec<String>> {
        self.seen_tools.lock().clone()
    }

    fn last_user_text(conversation: &Conversation) -> String {
        conversation
            .last_user_index()
            .map(|idx| conversation.messages()[idx].text())
            .unwrap_or_default()
    }

    fn summarize_tool_results(conversation: &Conversation) -> String {
        let lines: Vec<String> = conversation
            .since_last_user()
            .iter()
            .filter_map(|m| m.tool_result_part())
            .map(|r| {
                if r.succeeded {
                    format!("{} returned {}", r.name(), r.payload_text())
                } else {
                    format!(
                        "{} failed: {}",
                        r.name(),
                        r.error_message.as_deref().unwrap_or("unknown error")
                    )
                }
            })
            .collect();

        if lines.is_empty() {
            "No tool results.".to_string()
        } else {
            format!("Based on the tool results: {}", lines.join("; "))
        }
    }

    fn scripted_reply(
        replies: &[MockReply],
        conversation: &Conversation,
    ) -> TransportResult<ModelResponse> {
        let index = conversation
            .since_last_user()
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .count();

        let reply = replies.get(index).ok_or_else(|| {
            TransportError::invalid_response("mock", format!("no scripted reply #{}", index))
        })?;

        match reply {
            MockReply::Text(text) => Ok(ModelResponse::text(text.clone())),
            MockReply::ToolCalls { text, calls } => {
                Ok(ModelResponse::with_tool_calls(text.clone(), calls.clone()))
            }
            MockReply::SummarizeToolResults => {
                Ok(ModelResponse::text(Self::summarize_tool_results(conversation)))
            }
            MockReply::Error(message) => Err(TransportError::Other(message.clone())),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_api_base(&self) -> &str {
        "mock://localhost"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn send(
        &self,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> TransportResult<ModelResponse> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen_tools
            .lock()
            .push(tools.iter().map(|t| t.name.clone()).collect());
        self.logger.debug(&format!(
            "[MockProvider] send #{} ({} messages, {} tools)",
            n,
            conversation.len(),
            tools.len()
        ));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.mode {
            MockMode::Echo => Ok(ModelResponse::text(format!(
                "Echo: {}",
                Self::last_user_text(conversation)
            ))),
            MockMode::Fixed(text) => Ok(ModelResponse::text(text.clone())),
            MockMode::Script(replies) => Self::scripted_reply(replies, conversation),
            MockMode::Error(message) => Err(TransportError::Other(message.clone())),
        }
    }
}
