//! Parameter schemas for tool declarations

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// JSON Schema primitive types accepted for tool parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Object => "object",
            SchemaType::Array => "array",
        }
    }
}

/// A single named parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertySchema {
    pub fn new(kind: SchemaType) -> Self {
        Self {
            kind,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Errors produced while checking tool arguments
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The schema itself could not be compiled
    #[error("invalid parameter schema: {0}")]
    Compile(String),

    /// Arguments violate the schema
    #[error("arguments do not match schema: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Object schema describing the arguments of a tool
///
/// Always an object at the top level. Properties are kept sorted by name so
/// that the rendered schema is identical across calls.
///
/// ```
/// use toolloop_core::types::{ParameterSchema, SchemaType};
///
/// let schema = ParameterSchema::object()
///     .required("symbol", SchemaType::String, "The stock symbol (e.g., AAPL for Apple)");
/// assert!(schema.validate(&serde_json::json!({ "symbol": "AAPL" })).is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ParameterSchema {
    /// Empty object schema (a tool without parameters)
    pub fn object() -> Self {
        Self::default()
    }

    /// Add a required property
    pub fn required(
        mut self,
        name: impl Into<String>,
        kind: SchemaType,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            PropertySchema::new(kind).with_description(description),
        );
        if !self.required.contains(&name) {
            self.required.push(name);
        }
        self
    }

    /// Add an optional property
    pub fn optional(
        mut self,
        name: impl Into<String>,
        kind: SchemaType,
        description: impl Into<String>,
    ) -> Self {
        self.properties.insert(
            name.into(),
            PropertySchema::new(kind).with_description(description),
        );
        self
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Render as a JSON Schema object
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for (name, prop) in &self.properties {
            let mut entry = Map::new();
            entry.insert("type".to_string(), Value::from(prop.kind.as_str()));
            if let Some(description) = &prop.description {
                entry.insert("description".to_string(), Value::from(description.as_str()));
            }
            properties.insert(name.clone(), Value::Object(entry));
        }

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !self.required.is_empty() {
            schema["required"] = json!(self.required);
        }
        schema
    }

    /// Check arguments against this schema, reporting every violation
    pub fn validate(&self, arguments: &Value) -> Result<(), SchemaError> {
        let schema = self.to_json_schema();
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| SchemaError::Compile(e.to_string()))?;

        let violations: Vec<String> = validator
            .iter_errors(arguments)
            .map(|err| err.to_string())
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Invalid(violations))
        }
    }
}
