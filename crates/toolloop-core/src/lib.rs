//! toolloop core
//!
//! Tool-calling conversations against hosted and local LLMs.
//!
//! ## Pieces
//!
//! - `tools`: registry of declared tools and their handlers
//! - `session`: append-only conversation history
//! - `providers`: model client adapters (Gemini, Ollama, genai-backed, mock)
//! - `turn`: the tool-call resolution loop
//! - `observe`: trace emission (Langfuse, in-memory, no-op)
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use toolloop_core::logging::NoOpLogger;
//! use toolloop_core::providers::{MockProvider, MockReply};
//! use toolloop_core::tools::builtin;
//! use toolloop_core::types::ToolCallRequest;
//! use toolloop_core::{Conversation, ToolCallLoop};
//!
//! # tokio_test_runtime(async {
//! let registry = Arc::new(builtin::arithmetic_registry(Arc::new(NoOpLogger)).unwrap());
//! let provider = Arc::new(MockProvider::scripted(vec![
//!     MockReply::tool_calls(vec![ToolCallRequest::new(
//!         "call-1",
//!         "subtractTwoNumbers",
//!         json!({ "a": 3, "b": 1 }),
//!     )]),
//!     MockReply::SummarizeToolResults,
//! ]));
//!
//! let tool_loop = ToolCallLoop::new(provider, registry);
//! let mut conversation = Conversation::new();
//! let answer = tool_loop
//!     .process_query(&mut conversation, "What is three minus one?")
//!     .await
//!     .unwrap();
//! assert!(answer.contains("returned 2"));
//! # });
//! # fn tokio_test_runtime<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod observe;
pub mod providers;
pub mod secrets;
pub mod session;
pub mod tools;
pub mod turn;
pub mod types;

// Re-export commonly used types
pub use types::{
    ChatMessage, ContentPart, MessageContent, MessageRole, ModelResponse, ParameterSchema,
    SchemaType, TokenUsage, ToolCallRequest, ToolCallResult, ToolDeclaration,
};

pub use session::Conversation;

pub use tools::{FnHandler, RegistryError, ToolError, ToolHandler, ToolRegistry};

pub use providers::{create_provider, Provider, ProviderModelConfig, TransportError};

pub use turn::{ToolCallLoop, TurnError, TurnOptions, TurnOutcome};

pub use observe::{LangfuseConfig, LangfuseSink, MemorySink, NoopSink, TraceSink, Tracer};

pub use logging::{ConsoleLogger, Logger, NoOpLogger, SharedLogger};

pub use secrets::{ChainSecretStore, EnvSecretStore, MemorySecretStore, SecretStore};

pub use config::{load_config, AppConfig, ConfigError, ConfigFile};
