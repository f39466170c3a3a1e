//! Ask a hosted model (Gemini by default) for a stock price, tracing the
//! whole exchange to Langfuse.
//!
//! Usage: `stock-price [QUERY]`
//!
//! Needs `GEMINI_API_KEY` (or `GOOGLE_API_KEY`). Tracing is enabled when
//! `LANGFUSE_PUBLIC_KEY` and `LANGFUSE_SECRET_KEY` are set.

use std::process::ExitCode;
use std::sync::Arc;

use toolloop_cli::{console_logger, env_secrets, query_from_args};
use toolloop_core::config::{load_config, TracingSettings};
use toolloop_core::logging::SharedLogger;
use toolloop_core::observe::{LangfuseSink, Tracer};
use toolloop_core::providers::create_provider;
use toolloop_core::tools::builtin;
use toolloop_core::{Conversation, SecretStore, ToolCallLoop};

const DEFAULT_QUERY: &str = "What's the current stock price of Apple?";

fn build_tracer(
    settings: &TracingSettings,
    secrets: &dyn SecretStore,
    logger: &SharedLogger,
) -> Tracer {
    let tracer = match settings.langfuse_config(secrets) {
        Some(config) => match LangfuseSink::new(config, Arc::clone(logger)) {
            Ok(sink) => Tracer::new(Arc::new(sink), Arc::clone(logger)),
            Err(e) => {
                logger.warn(&format!("Langfuse disabled: {}", e));
                Tracer::noop()
            }
        },
        None => {
            logger.warn("Langfuse keys not set; traces will not be exported");
            Tracer::noop()
        }
    };
    tracer.with_environment(settings.environment.clone())
}

#[tokio::main]
async fn main() -> ExitCode {
    let logger = console_logger();
    let secrets = env_secrets();
    let query = query_from_args(DEFAULT_QUERY);

    let config = match load_config(None) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let provider = match create_provider(
        &config.provider.kind,
        config.provider.model_config(),
        Arc::clone(&secrets),
        Arc::clone(&logger),
    ) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = match builtin::stock_registry(Arc::clone(&logger)) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tracer = build_tracer(&config.tracing, secrets.as_ref(), &logger);
    let tool_loop = ToolCallLoop::new(provider, registry)
        .with_tracer(tracer.clone())
        .with_logger(Arc::clone(&logger))
        .with_options(config.turn.options());

    let mut conversation = Conversation::new();
    println!("Query: {}", query);
    let status = match tool_loop.process_query(&mut conversation, &query).await {
        Ok(text) => {
            println!("Response: {}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error processing query: {}", e);
            ExitCode::FAILURE
        }
    };

    // Traces are exported even when the query failed
    tracer.shutdown().await;
    status
}
