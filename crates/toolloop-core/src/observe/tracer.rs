//! Trace and span handles
//!
//! A handle is open from creation until `end` consumes it. Dropping an open
//! handle closes it with no output, so nothing is left dangling on early
//! returns.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::logging::{NoOpLogger, SharedLogger};

use super::record::{ObservationKind, ObservationLevel, ObservationRecord};
use super::sink::{NoopSink, TraceSink};

/// Entry point for emitting traces
#[derive(Clone)]
pub struct Tracer {
    sink: Arc<dyn TraceSink>,
    logger: SharedLogger,
    environment: Option<String>,
}

impl Tracer {
    pub fn new(sink: Arc<dyn TraceSink>, logger: SharedLogger) -> Self {
        Self {
            sink,
            logger,
            environment: None,
        }
    }

    /// Tracer that records nothing
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopSink), Arc::new(NoOpLogger))
    }

    /// Tag every trace with an `environment` metadata entry
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn start_trace(&self, name: impl Into<String>, input: Value) -> TraceHandle {
        let mut record =
            ObservationRecord::open(ObservationKind::Trace, None, None, name, Some(input));
        if let Some(ref env) = self.environment {
            record
                .metadata
                .insert("environment".to_string(), json!(env));
        }
        TraceHandle {
            open: Open::new(record, Arc::clone(&self.sink)),
        }
    }

    /// Deliver buffered observations. Failures are logged, never returned.
    pub async fn flush(&self) {
        if let Err(e) = self.sink.flush().await {
            self.logger
                .error(&format!("[Tracer] Failed to flush traces: {}", e));
        }
    }

    /// Final flush before the process exits
    pub async fn shutdown(&self) {
        self.logger.debug("[Tracer] Shutting down, flushing traces");
        self.flush().await;
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

/// Observation under construction
struct Open {
    id: String,
    trace_id: String,
    record: Option<ObservationRecord>,
    sink: Arc<dyn TraceSink>,
}

impl Open {
    fn new(record: ObservationRecord, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            id: record.id.clone(),
            trace_id: record.trace_id.clone(),
            record: Some(record),
            sink,
        }
    }

    /// Parent observation for children; `None` directly under a trace
    fn parent(&self) -> Option<String> {
        (self.id != self.trace_id).then(|| self.id.clone())
    }

    fn child(&self, name: impl Into<String>, input: Value) -> Open {
        let record = ObservationRecord::open(
            ObservationKind::Span,
            Some(self.trace_id.clone()),
            self.parent(),
            name,
            Some(input),
        );
        Open::new(record, Arc::clone(&self.sink))
    }

    fn event(&self, name: &str, input: Value, level: ObservationLevel) {
        let mut record = ObservationRecord::open(
            ObservationKind::Event,
            Some(self.trace_id.clone()),
            self.parent(),
            name,
            Some(input),
        );
        record.level = level;
        record.end_time = Some(record.start_time);
        self.sink.record(record);
    }

    fn metadata(&mut self, key: String, value: Value) {
        if let Some(record) = self.record.as_mut() {
            record.metadata.insert(key, value);
        }
    }

    fn finish(&mut self, output: Option<Value>, error: Option<String>) {
        if let Some(mut record) = self.record.take() {
            record.end_time = Some(Utc::now());
            record.output = output;
            if let Some(message) = error {
                record.level = ObservationLevel::Error;
                record.status_message = Some(message);
            }
            self.sink.record(record);
        }
    }
}

impl Drop for Open {
    fn drop(&mut self) {
        self.finish(None, None);
    }
}

/// Open trace
pub struct TraceHandle {
    open: Open,
}

impl TraceHandle {
    pub fn id(&self) -> &str {
        &self.open.id
    }

    pub fn span(&self, name: impl Into<String>, input: Value) -> SpanHandle {
        SpanHandle {
            open: self.open.child(name, input),
        }
    }

    pub fn event(&self, name: &str, input: Value) {
        self.open.event(name, input, ObservationLevel::Default);
    }

    /// Event flagged at error level
    pub fn error_event(&self, name: &str, input: Value) {
        self.open.event(name, input, ObservationLevel::Error);
    }

    pub fn update_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.open.metadata(key.into(), value);
    }

    pub fn end(mut self, output: Value) {
        self.open.finish(Some(output), None);
    }

    pub fn end_with_error(mut self, message: impl Into<String>) {
        let message = message.into();
        self.open
            .finish(Some(json!({ "error": message })), Some(message));
    }
}

/// Open span
pub struct SpanHandle {
    open: Open,
}

impl SpanHandle {
    pub fn id(&self) -> &str {
        &self.open.id
    }

    pub fn trace_id(&self) -> &str {
        &self.open.trace_id
    }

    pub fn span(&self, name: impl Into<String>, input: Value) -> SpanHandle {
        SpanHandle {
            open: self.open.child(name, input),
        }
    }

    pub fn event(&self, name: &str, input: Value) {
        self.open.event(name, input, ObservationLevel::Default);
    }

    pub fn update_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.open.metadata(key.into(), value);
    }

    pub fn end(mut self, output: Value) {
        self.open.finish(Some(output), None);
    }

    pub fn end_with_error(mut self, message: impl Into<String>) {
        let message = message.into();
        self.open
            .finish(Some(json!({ "error": message })), Some(message));
    }
}
