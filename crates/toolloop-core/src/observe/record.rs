//! Observation records handed to trace sinks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What an observation represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    /// Root of a tree, one per processed query
    Trace,
    /// Timed unit of work inside a trace
    Span,
    /// Point-in-time marker
    Event,
}

/// Severity attached to an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObservationLevel {
    #[default]
    Default,
    Error,
}

impl ObservationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationLevel::Default => "DEFAULT",
            ObservationLevel::Error => "ERROR",
        }
    }
}

/// A finished observation
///
/// Traces and spans are recorded once, when they end. Events are recorded
/// when emitted, with `end_time` equal to `start_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: String,
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub kind: ObservationKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default)]
    pub level: ObservationLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl ObservationRecord {
    pub(crate) fn open(
        kind: ObservationKind,
        trace_id: Option<String>,
        parent_id: Option<String>,
        name: impl Into<String>,
        input: Option<Value>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            trace_id: trace_id.unwrap_or_else(|| id.clone()),
            id,
            parent_id,
            kind,
            name: name.into(),
            input,
            output: None,
            level: ObservationLevel::Default,
            status_message: None,
            metadata: Map::new(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == ObservationLevel::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trace_is_its_own_trace_id() {
        let trace = ObservationRecord::open(ObservationKind::Trace, None, None, "processQuery", None);
        assert_eq!(trace.id, trace.trace_id);

        let span = ObservationRecord::open(
            ObservationKind::Span,
            Some(trace.id.clone()),
            Some(trace.id.clone()),
            "sendMessage",
            Some(json!({ "message": "hi" })),
        );
        assert_ne!(span.id, trace.id);
        assert_eq!(span.trace_id, trace.id);
        assert!(!span.is_error());
    }

    #[test]
    fn test_level_serialization() {
        assert_eq!(serde_json::to_value(ObservationLevel::Error).unwrap(), json!("ERROR"));
        assert_eq!(ObservationLevel::default().as_str(), "DEFAULT");
    }
}
