//! Trace sink trait and in-process sinks

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use super::record::{ObservationKind, ObservationRecord};

/// Failure delivering trace data
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("tracing credentials missing: {0}")]
    MissingCredentials(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ingestion API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("background export failed: {0}")]
    Task(String),
}

pub type TraceResult<T> = Result<T, TraceError>;

/// Destination for finished observations
///
/// `record` must not block; sinks that talk to the network buffer and
/// export in the background. `flush` delivers everything buffered.
#[async_trait]
pub trait TraceSink: Send + Sync {
    fn record(&self, record: ObservationRecord);

    async fn flush(&self) -> TraceResult<()>;
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl TraceSink for NoopSink {
    fn record(&self, _record: ObservationRecord) {}

    async fn flush(&self) -> TraceResult<()> {
        Ok(())
    }
}

/// Keeps every record in memory, in recording order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ObservationRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ObservationRecord> {
        self.records.lock().clone()
    }

    /// Records with the given name
    pub fn named(&self, name: &str) -> Vec<ObservationRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    /// The single trace recorded, if there is exactly one
    pub fn only_trace(&self) -> Option<ObservationRecord> {
        let traces: Vec<_> = self
            .records
            .lock()
            .iter()
            .filter(|r| r.kind == ObservationKind::Trace)
            .cloned()
            .collect();
        match traces.len() {
            1 => traces.into_iter().next(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl TraceSink for MemorySink {
    fn record(&self, record: ObservationRecord) {
        self.records.lock().push(record);
    }

    async fn flush(&self) -> TraceResult<()> {
        Ok(())
    }
}
