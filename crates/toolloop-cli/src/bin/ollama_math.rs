//! Ask a local Ollama model an arithmetic question answered through the
//! `addTwoNumbers` and `subtractTwoNumbers` tools.
//!
//! Usage: `ollama-math [PROMPT]`
//!
//! The server defaults to `http://localhost:11434`; set `OLLAMA_HOST` or
//! `TOOLLOOP_API_BASE` to point elsewhere.

use std::process::ExitCode;
use std::sync::Arc;

use toolloop_cli::{console_logger, env_secrets, query_from_args};
use toolloop_core::config::{env_var, AppConfig};
use toolloop_core::providers::{create_provider, OLLAMA_DEFAULT_MODEL};
use toolloop_core::tools::builtin;
use toolloop_core::types::TOOL_NOT_FOUND;
use toolloop_core::{Conversation, ToolCallLoop};

const DEFAULT_PROMPT: &str = "What is three minus one?";

#[tokio::main]
async fn main() -> ExitCode {
    let logger = console_logger();
    let secrets = env_secrets();
    let prompt = query_from_args(DEFAULT_PROMPT);

    let mut config = AppConfig::for_provider("ollama", OLLAMA_DEFAULT_MODEL);
    config.provider.api_base = env_var("OLLAMA_HOST");
    config.tracing.enabled = false;
    if let Err(e) = config.apply_env() {
        eprintln!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let provider = match create_provider(
        &config.provider.kind,
        config.provider.model_config(),
        Arc::clone(&secrets),
        Arc::clone(&logger),
    ) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("An error occurred: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = match builtin::arithmetic_registry(Arc::clone(&logger)) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            eprintln!("An error occurred: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tool_loop = ToolCallLoop::new(provider, registry)
        .with_logger(logger)
        .with_options(config.turn.options());

    println!("Prompt: {}", prompt);
    let mut conversation = Conversation::new();
    let outcome = match tool_loop.run_turn(&mut conversation, &prompt).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("An error occurred: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if outcome.tool_results.is_empty() {
        println!("No tool calls returned from model");
    }
    for result in &outcome.tool_results {
        if result.error_message.as_deref() == Some(TOOL_NOT_FOUND) {
            println!("Function {} not found", result.name());
            continue;
        }
        println!("Calling function: {}", result.name());
        println!("Arguments: {}", result.request.arguments);
        match result.error_message {
            Some(ref message) => println!("Function failed: {}", message),
            None => println!("Function output: {}", result.output),
        }
    }
    println!("Final response: {}", outcome.text);

    ExitCode::SUCCESS
}
