//! Tool/function calling types

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::schema::ParameterSchema;

/// Error message recorded when a model asks for a tool that is not registered
pub const TOOL_NOT_FOUND: &str = "tool not found";

/// Error message recorded when arguments fail schema validation
pub const INVALID_ARGUMENTS: &str = "invalid arguments";

/// Declaration of a callable tool, as submitted to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Tool name (function name), unique within a registry
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// Schema for the arguments
    pub parameters: ParameterSchema,
}

impl ToolDeclaration {
    /// Create a new declaration without parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ParameterSchema::object(),
        }
    }

    /// Set the parameter schema
    pub fn with_parameters(mut self, parameters: ParameterSchema) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier for this call (generated when the provider does not assign one)
    pub id: String,
    /// Name of the tool being called
    pub name: String,
    /// Arguments for the tool
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Create a new tool call request
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a request with a fresh random id
    pub fn generated(name: impl Into<String>, arguments: Value) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), name, arguments)
    }

    /// Get an argument by key
    pub fn get_arg(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key)
    }

    /// Get an argument as a string
    pub fn get_arg_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }

    /// Get an argument as an f64
    pub fn get_arg_f64(&self, key: &str) -> Option<f64> {
        self.arguments.get(key).and_then(|v| v.as_f64())
    }
}

/// Outcome of resolving one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The call this result answers
    pub request: ToolCallRequest,
    /// Value returned by the handler (`Null` on failure)
    pub output: Value,
    /// Whether the handler ran and succeeded
    pub succeeded: bool,
    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolCallResult {
    /// Create a successful result
    pub fn success(request: ToolCallRequest, output: Value) -> Self {
        Self {
            request,
            output,
            succeeded: true,
            error_message: None,
        }
    }

    /// Create a failed result
    pub fn failure(request: ToolCallRequest, message: impl Into<String>) -> Self {
        Self {
            request,
            output: Value::Null,
            succeeded: false,
            error_message: Some(message.into()),
        }
    }

    /// The requested tool is not registered
    pub fn not_found(request: ToolCallRequest) -> Self {
        Self::failure(request, TOOL_NOT_FOUND)
    }

    /// The arguments did not match the declared schema
    pub fn invalid_arguments(request: ToolCallRequest) -> Self {
        Self::failure(request, INVALID_ARGUMENTS)
    }

    /// Name of the tool this result belongs to
    pub fn name(&self) -> &str {
        &self.request.name
    }

    /// Structured value sent back to the model
    pub fn payload(&self) -> Value {
        if self.succeeded {
            self.output.clone()
        } else {
            json!({ "error": self.error_message.as_deref().unwrap_or("unknown error") })
        }
    }

    /// Payload as text, for providers that only accept string content
    pub fn payload_text(&self) -> String {
        match self.payload() {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
}
