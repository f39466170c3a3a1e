//! Tool-call resolution loop

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Value};

use crate::logging::{NoOpLogger, SharedLogger};
use crate::observe::{TraceHandle, Tracer};
use crate::providers::{Provider, TransportError, TransportResult};
use crate::session::Conversation;
use crate::tools::ToolRegistry;
use crate::types::{
    ChatMessage, ModelResponse, ToolCallRequest, ToolCallResult, ToolDeclaration,
    INVALID_ARGUMENTS, TOOL_NOT_FOUND,
};

use super::options::{TurnError, TurnOptions, TurnOutcome, TurnResult};

/// Drives one user query to a final answer
///
/// Sends the conversation, resolves every requested tool call in order,
/// feeds the results back and returns the model's final text. The loop owns
/// no conversation state; callers pass the session in for each turn.
pub struct ToolCallLoop {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    tracer: Tracer,
    logger: SharedLogger,
    options: TurnOptions,
}

impl ToolCallLoop {
    pub fn new(provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            tracer: Tracer::noop(),
            logger: Arc::new(NoOpLogger),
            options: TurnOptions::default(),
        }
    }

    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_options(mut self, options: TurnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TurnOptions {
        &self.options
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Answer `query` and return only the final text
    pub async fn process_query(
        &self,
        conversation: &mut Conversation,
        query: &str,
    ) -> TurnResult<String> {
        Ok(self.run_turn(conversation, query).await?.text)
    }

    /// Answer `query`, appending every exchanged message to `conversation`
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        query: &str,
    ) -> TurnResult<TurnOutcome> {
        let mut trace = self
            .tracer
            .start_trace("processQuery", json!({ "query": query }));

        conversation.push(ChatMessage::user(query));
        let declarations = self.registry.declarations();

        let mut response = match self
            .send_traced(
                &trace,
                "sendMessage",
                json!({ "message": query }),
                conversation,
                &declarations,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(self.abort(trace, e)),
        };

        let mut tool_results = Vec::new();
        let mut detected = 0;
        let mut rounds = 0;

        while response.has_tool_calls() && rounds < self.options.max_rounds {
            let calls = std::mem::take(&mut response.tool_calls);
            detected += calls.len();
            for call in &calls {
                trace.event(
                    "functionCallDetected",
                    json!({ "name": call.name, "args": call.arguments }),
                );
            }

            conversation.push(ChatMessage::assistant_with_tool_calls(
                std::mem::take(&mut response.text),
                calls.clone(),
            ));

            // Every call in the batch is answered before the next send
            let mut round_results = Vec::with_capacity(calls.len());
            for call in calls {
                let result = self.resolve_call(&trace, call).await;
                conversation.push(ChatMessage::tool_result(result.clone()));
                round_results.push(result);
            }
            rounds += 1;

            let responses: Vec<Value> = round_results
                .iter()
                .map(|r| json!({ "name": r.name(), "response": r.payload() }))
                .collect();
            tool_results.extend(round_results);

            response = match self
                .send_traced(
                    &trace,
                    "sendFunctionResponse",
                    json!({ "functionResponses": responses }),
                    conversation,
                    &declarations,
                )
                .await
            {
                Ok(response) => response,
                Err(e) => return Err(self.abort(trace, e)),
            };
        }

        if response.has_tool_calls() {
            self.logger.warn(&format!(
                "[ToolCallLoop] Round limit ({}) reached; ignoring {} further tool call(s)",
                self.options.max_rounds,
                response.tool_calls.len()
            ));
        }

        let text = response.text;
        conversation.push(ChatMessage::assistant(text.clone()));

        trace.update_metadata("functionCallsDetected", json!(detected));
        trace.end(json!({ "response": text }));

        Ok(TurnOutcome {
            text,
            tool_results,
            rounds,
        })
    }

    fn abort(&self, trace: TraceHandle, error: TransportError) -> TurnError {
        let message = error.to_string();
        self.logger
            .error(&format!("[ToolCallLoop] Turn aborted: {}", message));
        trace.error_event("error", json!({ "error": message }));
        trace.end_with_error(message);
        TurnError::Transport(error)
    }

    async fn send_traced(
        &self,
        trace: &TraceHandle,
        span_name: &str,
        input: Value,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> TransportResult<ModelResponse> {
        let span = trace.span(span_name, input);
        match self.send(conversation, tools).await {
            Ok(response) => {
                let calls: Vec<Value> = response
                    .tool_calls
                    .iter()
                    .map(|c| json!({ "name": c.name, "args": c.arguments }))
                    .collect();
                let mut output = json!({
                    "text": response.text,
                    "hasFunctionCalls": response.has_tool_calls(),
                    "functionCalls": calls,
                });
                if let Some(usage) = &response.usage {
                    output["usage"] = json!(usage);
                }
                span.end(output);
                Ok(response)
            }
            Err(e) => {
                span.end_with_error(e.to_string());
                Err(e)
            }
        }
    }

    async fn send(
        &self,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> TransportResult<ModelResponse> {
        self.logger.debug(&format!(
            "[ToolCallLoop] Sending {} messages to {} ({})",
            conversation.len(),
            self.provider.name(),
            self.provider.model()
        ));

        match self.options.send_timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.send(conversation, tools))
                .await
                .map_err(|_| TransportError::Timeout {
                    provider: self.provider.name().to_string(),
                    seconds: limit.as_secs_f64(),
                })?,
            None => self.provider.send(conversation, tools).await,
        }
    }

    async fn resolve_call(&self, trace: &TraceHandle, call: ToolCallRequest) -> ToolCallResult {
        let span = trace.span(call.name.clone(), call.arguments.clone());

        let handler = match self.registry.resolve(&call.name) {
            Ok(handler) => handler,
            Err(e) => {
                self.logger
                    .warn(&format!("[ToolCallLoop] Function {} not found", call.name));
                self.logger.debug(&format!("[ToolCallLoop] {}", e));
                span.end_with_error(TOOL_NOT_FOUND);
                return ToolCallResult::not_found(call);
            }
        };

        if self.options.validate_arguments {
            let schema = self.registry.get(&call.name).map(|t| &t.declaration.parameters);
            if let Some(Err(e)) = schema.map(|s| s.validate(&call.arguments)) {
                self.logger.warn(&format!(
                    "[ToolCallLoop] Rejected arguments for {}: {}",
                    call.name, e
                ));
                span.end_with_error(format!("{}: {}", INVALID_ARGUMENTS, e));
                return ToolCallResult::invalid_arguments(call);
            }
        }

        self.logger.debug(&format!(
            "[ToolCallLoop] Calling {} with {}",
            call.name, call.arguments
        ));
        let outcome = AssertUnwindSafe(handler.call(call.arguments.clone()))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(output)) => {
                span.end(output.clone());
                ToolCallResult::success(call, output)
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                self.logger
                    .warn(&format!("[ToolCallLoop] {} failed: {}", call.name, message));
                span.end_with_error(message.clone());
                ToolCallResult::failure(call, message)
            }
            Err(panic) => {
                let message = format!("tool panicked: {}", panic_message(panic.as_ref()));
                self.logger
                    .error(&format!("[ToolCallLoop] {} {}", call.name, message));
                span.end_with_error(message.clone());
                ToolCallResult::failure(call, message)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;
    use crate::observe::{MemorySink, ObservationKind};
    use crate::providers::{MockProvider, MockReply};
    use crate::tools::{builtin, FnHandler, ToolError, ToolResult};
    use crate::types::{MessageRole, ParameterSchema, SchemaType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn math() -> Arc<ToolRegistry> {
        Arc::new(builtin::arithmetic_registry(Arc::new(NoOpLogger)).unwrap())
    }

    fn call(id: &str, name: &str, args: Value) -> ToolCallRequest {
        ToolCallRequest::new(id, name, args)
    }

    fn roles(conversation: &Conversation) -> Vec<MessageRole> {
        conversation.messages().iter().map(|m| m.role).collect()
    }

    #[tokio::test]
    async fn test_subtract_scenario() {
        let provider = Arc::new(MockProvider::scripted(vec![
            MockReply::tool_calls(vec![call("c1", "subtractTwoNumbers", json!({ "a": 3, "b": 1 }))]),
            MockReply::SummarizeToolResults,
        ]));
        let sink = Arc::new(MemorySink::new());
        let tool_loop = ToolCallLoop::new(provider.clone(), math())
            .with_tracer(Tracer::new(sink.clone(), Arc::new(NoOpLogger)));

        let mut convo = Conversation::new();
        let outcome = tool_loop
            .run_turn(&mut convo, "What is three minus one?")
            .await
            .unwrap();

        assert!(outcome.text.contains("subtractTwoNumbers returned 2"));
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.tool_results[0].output, json!(2));
        assert_eq!(provider.send_count(), 2);
        assert_eq!(
            roles(&convo),
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant
            ]
        );

        // Declarations go out with every send
        assert_eq!(
            provider.seen_tools(),
            vec![
                vec!["addTwoNumbers".to_string(), "subtractTwoNumbers".to_string()],
                vec!["addTwoNumbers".to_string(), "subtractTwoNumbers".to_string()],
            ]
        );

        let trace = sink.only_trace().unwrap();
        assert_eq!(trace.name, "processQuery");
        assert_eq!(trace.metadata["functionCallsDetected"], 1);
        assert_eq!(sink.named("sendMessage").len(), 1);
        assert_eq!(sink.named("functionCallDetected")[0].kind, ObservationKind::Event);
        assert_eq!(sink.named("subtractTwoNumbers")[0].output, Some(json!(2)));
        assert_eq!(sink.named("sendFunctionResponse").len(), 1);
    }

    #[tokio::test]
    async fn test_stock_price_scenario() {
        let provider = Arc::new(MockProvider::scripted(vec![
            MockReply::tool_calls(vec![call("c1", "getStockPrice", json!({ "symbol": "AAPL" }))]),
            MockReply::SummarizeToolResults,
        ]));
        let registry = Arc::new(builtin::stock_registry(Arc::new(NoOpLogger)).unwrap());
        let tool_loop = ToolCallLoop::new(provider, registry);

        let mut convo = Conversation::new();
        let text = tool_loop
            .process_query(&mut convo, "What's the current stock price of Apple?")
            .await
            .unwrap();

        assert!(text.contains("150.25"));
        assert!(text.contains("\"symbol\":\"AAPL\""));
    }

    #[tokio::test]
    async fn test_unknown_tool_scenario() {
        let provider = Arc::new(MockProvider::scripted(vec![
            MockReply::tool_calls(vec![call("c1", "getWeather", json!({ "city": "Paris" }))]),
            MockReply::SummarizeToolResults,
        ]));
        let logger = Arc::new(MemoryLogger::new());
        let tool_loop = ToolCallLoop::new(provider.clone(), math()).with_logger(logger.clone());

        let mut convo = Conversation::new();
        let outcome = tool_loop.run_turn(&mut convo, "Weather in Paris?").await.unwrap();

        let result = &outcome.tool_results[0];
        assert!(!result.succeeded);
        assert_eq!(result.error_message.as_deref(), Some(TOOL_NOT_FOUND));
        assert!(outcome.text.contains("getWeather failed: tool not found"));
        assert_eq!(provider.send_count(), 2);
        assert!(logger.contains("Function getWeather not found"));
        assert!(logger.contains("unknown tool: getWeather"));
    }

    #[tokio::test]
    async fn test_transport_error_on_first_send() {
        let provider = Arc::new(MockProvider::error("connection refused"));
        let sink = Arc::new(MemorySink::new());
        let tool_loop = ToolCallLoop::new(provider, math())
            .with_tracer(Tracer::new(sink.clone(), Arc::new(NoOpLogger)));

        let mut convo = Conversation::new();
        let err = tool_loop.run_turn(&mut convo, "hi").await.unwrap_err();

        assert!(matches!(err, TurnError::Transport(TransportError::Other(_))));
        assert_eq!(roles(&convo), vec![MessageRole::User]);
        assert!(sink.only_trace().unwrap().is_error());
        assert!(sink.named("error")[0].is_error());
        assert!(sink.named("sendMessage")[0].is_error());
    }

    #[tokio::test]
    async fn test_transport_error_after_tool_results() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let mut registry = ToolRegistry::default();
        registry
            .register(
                builtin::add_declaration(),
                Arc::new(FnHandler::new(move |args: Value| -> ToolResult<Value> {
                    seen.fetch_add(1, Ordering::SeqCst);
                    builtin::add_two_numbers(args)
                })),
            )
            .unwrap();

        let provider = Arc::new(MockProvider::scripted(vec![
            MockReply::tool_calls(vec![call("c1", "addTwoNumbers", json!({ "a": 1, "b": 2 }))]),
            MockReply::Error("service unavailable".to_string()),
        ]));
        let tool_loop = ToolCallLoop::new(provider, Arc::new(registry));

        let mut convo = Conversation::new();
        assert!(tool_loop.run_turn(&mut convo, "1 + 2?").await.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(
            roles(&convo),
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::Tool]
        );
    }

    #[tokio::test]
    async fn test_whole_batch_is_resolved() {
        let provider = Arc::new(MockProvider::scripted(vec![
            MockReply::tool_calls(vec![
                call("c1", "getWeather", json!({})),
                call("c2", "addTwoNumbers", json!({ "a": 2, "b": 2 })),
            ]),
            MockReply::SummarizeToolResults,
        ]));
        let tool_loop = ToolCallLoop::new(provider, math());

        let mut convo = Conversation::new();
        let outcome = tool_loop.run_turn(&mut convo, "two things").await.unwrap();

        assert_eq!(outcome.tool_results.len(), 2);
        assert_eq!(outcome.tool_results[1].output, json!(4));
        assert_eq!(
            outcome.text,
            "Based on the tool results: getWeather failed: tool not found; addTwoNumbers returned 4"
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments_skip_handler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let mut registry = ToolRegistry::default();
        registry
            .register(
                builtin::subtract_declaration(),
                Arc::new(FnHandler::new(move |args: Value| -> ToolResult<Value> {
                    seen.fetch_add(1, Ordering::SeqCst);
                    builtin::subtract_two_numbers(args)
                })),
            )
            .unwrap();
        let registry = Arc::new(registry);

        let script = vec![
            MockReply::tool_calls(vec![call("c1", "subtractTwoNumbers", json!({ "a": "three" }))]),
            MockReply::SummarizeToolResults,
        ];

        let tool_loop = ToolCallLoop::new(Arc::new(MockProvider::scripted(script.clone())), Arc::clone(&registry));
        let outcome = tool_loop.run_turn(&mut Conversation::new(), "3 - ?").await.unwrap();
        assert_eq!(
            outcome.tool_results[0].error_message.as_deref(),
            Some(INVALID_ARGUMENTS)
        );
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // With validation off the handler sees the arguments and reports the problem
        let tool_loop = ToolCallLoop::new(Arc::new(MockProvider::scripted(script)), registry)
            .with_options(TurnOptions::default().with_validation(false));
        let outcome = tool_loop.run_turn(&mut Conversation::new(), "3 - ?").await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(
            outcome.tool_results[0].error_message.as_deref(),
            Some("invalid argument 'a': expected a number")
        );
    }

    #[tokio::test]
    async fn test_handler_failure_and_panic() {
        let mut registry = ToolRegistry::default();
        registry
            .register(
                ToolDeclaration::new("flaky", "Always fails"),
                Arc::new(FnHandler::new(|_args: Value| -> ToolResult<Value> {
                    Err(ToolError::failed("quote service down"))
                })),
            )
            .unwrap();
        registry
            .register(
                ToolDeclaration::new("broken", "Always panics").with_parameters(
                    ParameterSchema::object().optional("x", SchemaType::Integer, "unused"),
                ),
                Arc::new(FnHandler::new(|_args: Value| -> ToolResult<Value> {
                    panic!("index out of range")
                })),
            )
            .unwrap();

        let provider = Arc::new(MockProvider::scripted(vec![
            MockReply::tool_calls(vec![call("c1", "flaky", json!({})), call("c2", "broken", json!({}))]),
            MockReply::SummarizeToolResults,
        ]));
        let tool_loop = ToolCallLoop::new(provider, Arc::new(registry));

        let outcome = tool_loop.run_turn(&mut Conversation::new(), "go").await.unwrap();
        assert_eq!(
            outcome.tool_results[0].error_message.as_deref(),
            Some("quote service down")
        );
        assert_eq!(
            outcome.tool_results[1].error_message.as_deref(),
            Some("tool panicked: index out of range")
        );
        assert!(outcome.text.contains("broken failed: tool panicked"));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let script = vec![
            MockReply::tool_calls(vec![call("c1", "addTwoNumbers", json!({ "a": 1, "b": 2 }))]),
            MockReply::ToolCalls {
                text: "Now subtracting.".to_string(),
                calls: vec![call("c2", "subtractTwoNumbers", json!({ "a": 3, "b": 1 }))],
            },
            MockReply::SummarizeToolResults,
        ];

        // Single round: the follow-up reply is final, its tool calls are dropped
        let single = ToolCallLoop::new(Arc::new(MockProvider::scripted(script.clone())), math());
        let mut convo = Conversation::new();
        let outcome = single.run_turn(&mut convo, "sum then diff").await.unwrap();
        assert_eq!(outcome.text, "Now subtracting.");
        assert_eq!(outcome.rounds, 1);
        assert!(convo.last().unwrap().tool_calls().is_empty());

        let multi = ToolCallLoop::new(Arc::new(MockProvider::scripted(script)), math())
            .with_options(TurnOptions::default().with_max_rounds(3));
        let outcome = multi.run_turn(&mut Conversation::new(), "sum then diff").await.unwrap();
        assert_eq!(outcome.rounds, 2);
        assert_eq!(
            outcome.text,
            "Based on the tool results: addTwoNumbers returned 3; subtractTwoNumbers returned 2"
        );
    }

    #[tokio::test]
    async fn test_send_timeout() {
        let provider = Arc::new(MockProvider::fixed("too late").with_delay(Duration::from_millis(500)));
        let tool_loop = ToolCallLoop::new(provider, math())
            .with_options(TurnOptions::default().with_send_timeout(Duration::from_millis(20)));

        let err = tool_loop.run_turn(&mut Conversation::new(), "hi").await.unwrap_err();
        assert!(matches!(
            err,
            TurnError::Transport(TransportError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_repeated_turns_are_identical() {
        let script = vec![
            MockReply::tool_calls(vec![call("c1", "subtractTwoNumbers", json!({ "a": 3, "b": 1 }))]),
            MockReply::SummarizeToolResults,
        ];
        let tool_loop = ToolCallLoop::new(Arc::new(MockProvider::scripted(script)), math());

        let base = Conversation::with_id("session-1");
        let mut first = base.clone();
        let mut second = base.clone();

        let a = tool_loop.run_turn(&mut first, "What is three minus one?").await.unwrap();
        let b = tool_loop.run_turn(&mut second, "What is three minus one?").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let provider = Arc::new(MockProvider::fixed("Hello there"));
        let sink = Arc::new(MemorySink::new());
        let tool_loop = ToolCallLoop::new(provider, math())
            .with_tracer(Tracer::new(sink.clone(), Arc::new(NoOpLogger)));

        let mut convo = Conversation::new();
        let outcome = tool_loop.run_turn(&mut convo, "hi").await.unwrap();

        assert_eq!(outcome.text, "Hello there");
        assert_eq!(outcome.rounds, 0);
        assert!(outcome.tool_results.is_empty());
        assert_eq!(roles(&convo), vec![MessageRole::User, MessageRole::Assistant]);
        assert!(sink.named("sendFunctionResponse").is_empty());
        assert_eq!(sink.only_trace().unwrap().metadata["functionCallsDetected"], 0);
    }
}
