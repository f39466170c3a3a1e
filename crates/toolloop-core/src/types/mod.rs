//! Core types shared by the registry, providers and the tool-call loop

mod message;
mod model;
mod schema;
mod tool;

pub use message::{ChatMessage, ContentPart, MessageContent, MessageRole};
pub use model::{ModelResponse, TokenUsage};
pub use schema::{ParameterSchema, PropertySchema, SchemaError, SchemaType};
pub use tool::{ToolCallRequest, ToolCallResult, ToolDeclaration, INVALID_ARGUMENTS, TOOL_NOT_FOUND};
