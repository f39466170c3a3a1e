//! Trace emission
//!
//! A [`Tracer`] hands out trace and span handles; finished observations go to
//! a [`TraceSink`]. Sink failures are logged and swallowed so tracing never
//! changes the outcome of a turn.
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use toolloop_core::logging::NoOpLogger;
//! use toolloop_core::observe::{MemorySink, Tracer};
//!
//! let sink = Arc::new(MemorySink::new());
//! let tracer = Tracer::new(sink.clone(), Arc::new(NoOpLogger));
//!
//! let trace = tracer.start_trace("processQuery", json!({ "query": "hi" }));
//! trace.span("sendMessage", json!({ "message": "hi" })).end(json!({ "text": "hello" }));
//! trace.end(json!({ "response": "hello" }));
//!
//! assert_eq!(sink.len(), 2);
//! ```

mod langfuse;
mod record;
mod sink;
mod tracer;

pub use langfuse::{
    to_ingestion_event, LangfuseConfig, LangfuseSink, DEFAULT_FLUSH_AT, DEFAULT_LANGFUSE_URL,
};
pub use record::{ObservationKind, ObservationLevel, ObservationRecord};
pub use sink::{MemorySink, NoopSink, TraceError, TraceResult, TraceSink};
pub use tracer::{SpanHandle, TraceHandle, Tracer};
