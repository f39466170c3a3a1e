//! Conversation history
//!
//! A [`Conversation`] is the ordered, append-only message history sent to a
//! model. It is owned by whoever is processing the current turn; sharing a
//! conversation between concurrent turns requires cloning it.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, MessageRole};

/// Ordered message history for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Start an empty conversation with a fresh id
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Start an empty conversation with a known id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            system_prompt: None,
            messages: Vec::new(),
        }
    }

    /// Set the system prompt sent ahead of the history
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Append a message. Prior messages are never touched.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// History in order, without the system prompt
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// History with the system prompt prepended, as sent to providers
    pub fn request_messages(&self) -> Vec<ChatMessage> {
        let mut msgs = Vec::with_capacity(self.messages.len() + 1);
        if let Some(ref system) = self.system_prompt {
            msgs.push(ChatMessage::system(system.clone()));
        }
        msgs.extend(self.messages.iter().cloned());
        msgs
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Index of the most recent user message
    pub fn last_user_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.role == MessageRole::User)
    }

    /// Messages appended after the most recent user message
    pub fn since_last_user(&self) -> &[ChatMessage] {
        match self.last_user_index() {
            Some(idx) => &self.messages[idx + 1..],
            None => &self.messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolCallRequest, ToolCallResult};
    use serde_json::json;

    #[test]
    fn test_push_is_append_only() {
        let mut convo = Conversation::new();
        convo.push(ChatMessage::user("one"));
        let before: Vec<ChatMessage> = convo.messages().to_vec();

        convo.push(ChatMessage::assistant("two"));
        convo.push(ChatMessage::user("three"));

        assert_eq!(convo.len(), 3);
        assert_eq!(&convo.messages()[..before.len()], before.as_slice());
        assert_eq!(convo.last().map(|m| m.text()), Some("three".to_string()));
    }

    #[test]
    fn test_request_messages_prepends_system_prompt() {
        let mut convo = Conversation::with_id("c-1").with_system_prompt("Be brief");
        convo.push(ChatMessage::user("hi"));

        let request = convo.request_messages();
        assert_eq!(request.len(), 2);
        assert_eq!(request[0].role, MessageRole::System);
        assert_eq!(convo.len(), 1);
        assert_eq!(convo.id(), "c-1");
    }

    #[test]
    fn test_since_last_user() {
        let mut convo = Conversation::new();
        assert!(convo.since_last_user().is_empty());

        convo.push(ChatMessage::user("first"));
        convo.push(ChatMessage::assistant("reply"));
        convo.push(ChatMessage::user("second"));
        assert!(convo.since_last_user().is_empty());

        let call = ToolCallRequest::new("c1", "addTwoNumbers", json!({ "a": 1, "b": 2 }));
        convo.push(ChatMessage::assistant_with_tool_calls("", vec![call.clone()]));
        convo.push(ChatMessage::tool_result(ToolCallResult::success(call, json!(3))));

        assert_eq!(convo.last_user_index(), Some(2));
        assert_eq!(convo.since_last_user().len(), 2);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = Conversation::new();
        original.push(ChatMessage::user("q"));

        let mut copy = original.clone();
        copy.push(ChatMessage::assistant("a"));

        assert_eq!(original.len(), 1);
        assert_eq!(copy.len(), 2);
    }
}
