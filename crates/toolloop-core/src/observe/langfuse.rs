//! Langfuse ingestion sink
//!
//! Observations are converted to ingestion events (`trace-create`,
//! `span-create`, `event-create`) and posted in batches to
//! `{base_url}/api/public/ingestion` with basic auth.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;

use crate::logging::SharedLogger;
use crate::secrets::SecretStore;

use super::record::{ObservationKind, ObservationRecord};
use super::sink::{TraceError, TraceResult, TraceSink};

pub const DEFAULT_LANGFUSE_URL: &str = "https://cloud.langfuse.com";
pub const DEFAULT_FLUSH_AT: usize = 15;

/// Connection settings for a Langfuse project
#[derive(Clone)]
pub struct LangfuseConfig {
    pub base_url: String,
    pub public_key: String,
    pub secret_key: String,
    /// Queue size that triggers a background export
    pub flush_at: usize,
}

impl LangfuseConfig {
    pub fn new(
        base_url: impl Into<String>,
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            public_key: public_key.into(),
            secret_key: secret_key.into(),
            flush_at: DEFAULT_FLUSH_AT,
        }
    }

    pub fn with_flush_at(mut self, flush_at: usize) -> Self {
        self.flush_at = flush_at.max(1);
        self
    }

    /// Read `langfuse_public_key`, `langfuse_secret_key` and `langfuse_url`
    pub fn from_secrets(secrets: &dyn SecretStore) -> TraceResult<Self> {
        let public_key = secrets
            .get("langfuse_public_key")
            .ok_or_else(|| TraceError::MissingCredentials("langfuse_public_key".to_string()))?;
        let secret_key = secrets
            .get("langfuse_secret_key")
            .ok_or_else(|| TraceError::MissingCredentials("langfuse_secret_key".to_string()))?;
        let base_url = secrets
            .get("langfuse_url")
            .unwrap_or_else(|| DEFAULT_LANGFUSE_URL.to_string());
        Ok(Self::new(base_url, public_key, secret_key))
    }

    fn ingestion_url(&self) -> String {
        format!(
            "{}/api/public/ingestion",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl std::fmt::Debug for LangfuseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LangfuseConfig")
            .field("base_url", &self.base_url)
            .field("public_key", &self.public_key)
            .field("secret_key", &"[REDACTED]")
            .field("flush_at", &self.flush_at)
            .finish()
    }
}

/// Convert a finished observation into one ingestion event
pub fn to_ingestion_event(record: &ObservationRecord) -> Value {
    let (kind, body) = match record.kind {
        ObservationKind::Trace => {
            let mut metadata = record.metadata.clone();
            if let Some(ref message) = record.status_message {
                metadata.insert("level".to_string(), json!(record.level.as_str()));
                metadata.insert("statusMessage".to_string(), json!(message));
            }
            let mut body = Map::new();
            body.insert("id".to_string(), json!(record.id));
            body.insert("name".to_string(), json!(record.name));
            body.insert("timestamp".to_string(), json!(record.start_time.to_rfc3339()));
            insert_opt(&mut body, "input", record.input.clone());
            insert_opt(&mut body, "output", record.output.clone());
            if !metadata.is_empty() {
                body.insert("metadata".to_string(), Value::Object(metadata));
            }
            ("trace-create", body)
        }
        ObservationKind::Span | ObservationKind::Event => {
            let mut body = Map::new();
            body.insert("id".to_string(), json!(record.id));
            body.insert("traceId".to_string(), json!(record.trace_id));
            insert_opt(
                &mut body,
                "parentObservationId",
                record
                    .parent_id
                    .as_ref()
                    .filter(|p| **p != record.trace_id)
                    .map(|p| json!(p)),
            );
            body.insert("name".to_string(), json!(record.name));
            body.insert("startTime".to_string(), json!(record.start_time.to_rfc3339()));
            if record.kind == ObservationKind::Span {
                insert_opt(
                    &mut body,
                    "endTime",
                    record.end_time.map(|t| json!(t.to_rfc3339())),
                );
            }
            insert_opt(&mut body, "input", record.input.clone());
            insert_opt(&mut body, "output", record.output.clone());
            body.insert("level".to_string(), json!(record.level.as_str()));
            insert_opt(
                &mut body,
                "statusMessage",
                record.status_message.as_ref().map(|m| json!(m)),
            );
            if !record.metadata.is_empty() {
                body.insert("metadata".to_string(), Value::Object(record.metadata.clone()));
            }
            let kind = if record.kind == ObservationKind::Span {
                "span-create"
            } else {
                "event-create"
            };
            (kind, body)
        }
    };

    json!({
        "id": uuid::Uuid::new_v4().to_string(),
        "timestamp": Utc::now().to_rfc3339(),
        "type": kind,
        "body": Value::Object(body),
    })
}

fn insert_opt(body: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        body.insert(key.to_string(), v);
    }
}

struct Exporter {
    config: LangfuseConfig,
    http: reqwest::Client,
    logger: SharedLogger,
}

impl Exporter {
    async fn post_batch(&self, batch: Vec<Value>) -> TraceResult<()> {
        let count = batch.len();
        let response = self
            .http
            .post(self.config.ingestion_url())
            .basic_auth(&self.config.public_key, Some(&self.config.secret_key))
            .json(&json!({ "batch": batch }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TraceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        // 207 carries per-event results
        if status.as_u16() == 207 {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            if let Some(errors) = body["errors"].as_array().filter(|e| !e.is_empty()) {
                let first = errors[0]["message"]
                    .as_str()
                    .or_else(|| errors[0]["error"].as_str())
                    .unwrap_or("unknown error");
                self.logger.warn(&format!(
                    "[LangfuseSink] {} of {} events rejected: {}",
                    errors.len(),
                    count,
                    first
                ));
            }
        }

        self.logger
            .debug(&format!("[LangfuseSink] exported {} events", count));
        Ok(())
    }
}

/// Buffered exporter to the Langfuse ingestion API
pub struct LangfuseSink {
    exporter: Arc<Exporter>,
    buffer: Mutex<Vec<Value>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl LangfuseSink {
    pub fn new(config: LangfuseConfig, logger: SharedLogger) -> TraceResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(crate::providers::CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            exporter: Arc::new(Exporter {
                config,
                http,
                logger,
            }),
            buffer: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Number of events waiting for export
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    fn spawn_export(&self, batch: Vec<Value>) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                // No runtime to export on; keep the batch for the next flush
                self.buffer.lock().extend(batch);
                return;
            }
        };

        let exporter = Arc::clone(&self.exporter);
        let task = handle.spawn(async move {
            if let Err(e) = exporter.post_batch(batch).await {
                exporter
                    .logger
                    .error(&format!("[LangfuseSink] Background export failed: {}", e));
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|t| !t.is_finished());
        pending.push(task);
    }
}

#[async_trait]
impl TraceSink for LangfuseSink {
    fn record(&self, record: ObservationRecord) {
        let event = to_ingestion_event(&record);
        let ready = {
            let mut buffer = self.buffer.lock();
            buffer.push(event);
            if buffer.len() >= self.exporter.config.flush_at {
                Some(std::mem::take(&mut *buffer))
            } else {
                None
            }
        };
        if let Some(batch) = ready {
            self.spawn_export(batch);
        }
    }

    async fn flush(&self) -> TraceResult<()> {
        let tasks = std::mem::take(&mut *self.pending.lock());
        for task in tasks {
            if let Err(e) = task.await {
                self.exporter
                    .logger
                    .error(&format!("[LangfuseSink] Export task failed: {}", e));
            }
        }

        let batch = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return Ok(());
        }
        self.exporter.post_batch(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{MemoryLogger, NoOpLogger};
    use crate::observe::record::ObservationLevel;
    use crate::observe::{MemorySink, Tracer};
    use crate::providers::MockProvider;
    use crate::secrets::MemorySecretStore;
    use crate::tools::builtin;
    use crate::{Conversation, ToolCallLoop};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // base64("pk-lf-test:sk-lf-test")
    const AUTH: &str = "Basic cGstbGYtdGVzdDpzay1sZi10ZXN0";

    fn record(kind: ObservationKind, name: &str) -> ObservationRecord {
        let mut r = ObservationRecord::open(kind, None, None, name, Some(json!({ "query": "q" })));
        r.end_time = Some(Utc::now());
        r
    }

    fn sink(base: &str, flush_at: usize, logger: Arc<MemoryLogger>) -> LangfuseSink {
        LangfuseSink::new(
            LangfuseConfig::new(base, "pk-lf-test", "sk-lf-test").with_flush_at(flush_at),
            logger,
        )
        .unwrap()
    }

    async fn ingestion_bodies(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    #[test]
    fn test_span_event_shape() {
        let trace = record(ObservationKind::Trace, "processQuery");
        let mut span = ObservationRecord::open(
            ObservationKind::Span,
            Some(trace.id.clone()),
            None,
            "getStockPrice",
            Some(json!({ "symbol": "AAPL" })),
        );
        span.end_time = Some(Utc::now());
        span.level = ObservationLevel::Error;
        span.status_message = Some("quote service down".to_string());

        let event = to_ingestion_event(&span);
        assert_eq!(event["type"], "span-create");
        assert_eq!(event["body"]["traceId"], json!(trace.id));
        assert!(event["body"].get("parentObservationId").is_none());
        assert_eq!(event["body"]["level"], "ERROR");
        assert_eq!(event["body"]["statusMessage"], "quote service down");
        assert!(event["body"]["endTime"].is_string());

        let nested = ObservationRecord::open(
            ObservationKind::Event,
            Some(trace.id.clone()),
            Some(span.id.clone()),
            "retry",
            None,
        );
        let event = to_ingestion_event(&nested);
        assert_eq!(event["type"], "event-create");
        assert_eq!(event["body"]["parentObservationId"], json!(span.id));
    }

    #[test]
    fn test_trace_id_never_sent_as_parent() {
        let trace = record(ObservationKind::Trace, "processQuery");
        let span = ObservationRecord::open(
            ObservationKind::Span,
            Some(trace.id.clone()),
            Some(trace.id.clone()),
            "sendMessage",
            None,
        );
        let event = to_ingestion_event(&span);
        assert!(event["body"].get("parentObservationId").is_none());
    }

    #[tokio::test]
    async fn test_turn_spans_are_top_level() {
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(sink.clone(), Arc::new(NoOpLogger));
        let registry = Arc::new(builtin::stock_registry(Arc::new(NoOpLogger)).unwrap());
        let tool_loop = ToolCallLoop::new(Arc::new(MockProvider::fixed("150.25")), registry)
            .with_tracer(tracer);
        tool_loop
            .process_query(&mut Conversation::new(), "AAPL?")
            .await
            .unwrap();

        let span = &sink.named("sendMessage")[0];
        let event = to_ingestion_event(span);
        assert_eq!(event["body"]["traceId"], json!(span.trace_id));
        assert!(event["body"].get("parentObservationId").is_none());
    }

    #[test]
    fn test_trace_event_shape() {
        let mut trace = record(ObservationKind::Trace, "processQuery");
        trace
            .metadata
            .insert("environment".to_string(), json!("development"));

        let event = to_ingestion_event(&trace);
        assert_eq!(event["type"], "trace-create");
        assert_eq!(event["body"]["name"], "processQuery");
        assert_eq!(event["body"]["metadata"]["environment"], "development");
        assert!(event["body"].get("traceId").is_none());
    }

    #[test]
    fn test_config_from_secrets() {
        let store = MemorySecretStore::new()
            .with("langfuse_public_key", "pk")
            .with("langfuse_secret_key", "sk");
        let config = LangfuseConfig::from_secrets(&store).unwrap();
        assert_eq!(config.base_url, DEFAULT_LANGFUSE_URL);
        assert_eq!(config.ingestion_url(), "https://cloud.langfuse.com/api/public/ingestion");
        assert!(!format!("{:?}", config).contains("\"sk\""));

        let missing = LangfuseConfig::from_secrets(&MemorySecretStore::new().with("langfuse_public_key", "pk"));
        assert!(matches!(missing, Err(TraceError::MissingCredentials(_))));
    }

    #[tokio::test]
    async fn test_flush_posts_buffered_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/public/ingestion"))
            .and(header("authorization", AUTH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "successes": [], "errors": [] })))
            .mount(&server)
            .await;

        let sink = sink(&server.uri(), 10, Arc::new(MemoryLogger::new()));
        sink.record(record(ObservationKind::Trace, "processQuery"));
        sink.record(record(ObservationKind::Event, "functionCallDetected"));
        assert_eq!(sink.buffered(), 2);

        sink.flush().await.unwrap();
        assert_eq!(sink.buffered(), 0);

        let bodies = ingestion_bodies(&server).await;
        assert_eq!(bodies.len(), 1);
        let batch = bodies[0]["batch"].as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1]["type"], "event-create");

        // Nothing left to send
        sink.flush().await.unwrap();
        assert_eq!(ingestion_bodies(&server).await.len(), 1);
    }

    #[tokio::test]
    async fn test_background_export_at_threshold() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/public/ingestion"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let sink = sink(&server.uri(), 2, Arc::new(MemoryLogger::new()));
        sink.record(record(ObservationKind::Span, "sendMessage"));
        sink.record(record(ObservationKind::Span, "getStockPrice"));
        assert_eq!(sink.buffered(), 0);
        sink.record(record(ObservationKind::Trace, "processQuery"));

        sink.flush().await.unwrap();

        let bodies = ingestion_bodies(&server).await;
        assert_eq!(bodies.len(), 2);
        let sizes: Vec<usize> = bodies
            .iter()
            .map(|b| b["batch"].as_array().map(|a| a.len()).unwrap_or(0))
            .collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_partial_failure_is_logged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(207).set_body_json(json!({
                "successes": [],
                "errors": [{ "id": "1", "status": 400, "message": "invalid body" }]
            })))
            .mount(&server)
            .await;

        let logger = Arc::new(MemoryLogger::new());
        let sink = sink(&server.uri(), 10, logger.clone());
        sink.record(record(ObservationKind::Trace, "processQuery"));

        sink.flush().await.unwrap();
        assert!(logger.contains("1 of 1 events rejected: invalid body"));
    }

    #[tokio::test]
    async fn test_background_failure_is_logged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
            .mount(&server)
            .await;

        let logger = Arc::new(MemoryLogger::new());
        let sink = sink(&server.uri(), 1, logger.clone());
        sink.record(record(ObservationKind::Trace, "processQuery"));

        sink.flush().await.unwrap();
        assert!(logger.contains("Background export failed"));
        assert!(logger.contains("invalid credentials"));
    }
}
