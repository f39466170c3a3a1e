//! Tool handler trait

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure raised by a tool handler
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// An argument was present but unusable
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// The handler ran and failed
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Implementation behind a declared tool
///
/// Handlers receive the model's arguments as JSON and return a JSON result.
/// They are invoked only by the tool-call loop, one at a time.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> ToolResult<Value>;
}

/// Adapts a synchronous closure into a [`ToolHandler`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Value) -> ToolResult<Value> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> ToolResult<Value> + Send + Sync,
{
    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        (self.f)(arguments)
    }
}

/// Read a required numeric argument
pub fn number_arg(arguments: &Value, name: &str) -> ToolResult<f64> {
    match arguments.get(name) {
        Some(v) => v
            .as_f64()
            .ok_or_else(|| ToolError::invalid_argument(name, "expected a number")),
        None => Err(ToolError::invalid_argument(name, "missing")),
    }
}

/// Read a required string argument
pub fn string_arg<'a>(arguments: &'a Value, name: &str) -> ToolResult<&'a str> {
    match arguments.get(name) {
        Some(v) => v
            .as_str()
            .ok_or_else(|| ToolError::invalid_argument(name, "expected a string")),
        None => Err(ToolError::invalid_argument(name, "missing")),
    }
}
