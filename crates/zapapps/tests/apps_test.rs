use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use zapapps::{
    register_all, GmailHandler, SheetsHandler, Simulation, SlackHandler, TrelloHandler,
};
use zapcore::{
    EventBus, ExecutionStatus, StepContext, StepDescriptor, StepError, StepHandler, StepStatus,
    Value,
};
use zapruntime::{EngineConfig, ExecutionEngine, HandlerRegistry};

// Helper function to create a test context
fn create_test_context(step: StepDescriptor, input: Value) -> StepContext {
    let event_bus = EventBus::new(100);
    let execution_id = uuid::Uuid::new_v4();

    StepContext {
        execution_id,
        events: event_bus.create_emitter(execution_id, step.id.clone()),
        step,
        input,
        cancellation: CancellationToken::new(),
    }
}

fn registry_with(simulation: Simulation) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    register_all(&mut registry, &simulation);
    registry
}

#[tokio::test]
async fn test_gmail_uses_config() {
    let handler = GmailHandler::new(Simulation::instant());
    let step = StepDescriptor::new("t1", "gmail")
        .with_action("New Email")
        .with_config("subject", "Invoice #42");

    let output = handler
        .handle(create_test_context(step, Value::Null))
        .await
        .unwrap();

    assert_eq!(output.get("subject").and_then(|v| v.as_str()), Some("Invoice #42"));
    let message_id = output.get("messageId").and_then(|v| v.as_str()).unwrap();
    assert!(message_id.starts_with("msg_"));
}

#[tokio::test]
async fn test_slack_echoes_upstream_subject() {
    let handler = SlackHandler::new(Simulation::instant());
    let step = StepDescriptor::new("a1", "slack").with_config("channel", "#alerts");
    let input = Value::object([("subject", "Server down")]);

    let output = handler
        .handle(create_test_context(step, input))
        .await
        .unwrap();

    assert_eq!(output.get("channel").and_then(|v| v.as_str()), Some("#alerts"));
    assert_eq!(output.get("text").and_then(|v| v.as_str()), Some("Server down"));
    // Upstream fields are carried forward.
    assert_eq!(output.get("subject").and_then(|v| v.as_str()), Some("Server down"));
}

#[tokio::test]
async fn test_slack_rejects_bad_channel() {
    let handler = SlackHandler::new(Simulation::instant());
    let step = StepDescriptor::new("a1", "slack").with_config("channel", "general");

    let result = handler.handle(create_test_context(step, Value::Null)).await;

    assert!(matches!(result, Err(StepError::Configuration(_))));
}

#[tokio::test]
async fn test_sheets_requires_spreadsheet_id() {
    let handler = SheetsHandler::new(Simulation::instant());
    let step = StepDescriptor::new("a2", "sheets").with_action("Add Row");

    let result = handler.handle(create_test_context(step, Value::Null)).await;

    assert_eq!(
        result,
        Err(StepError::Configuration("Missing config: spreadsheetId".to_string()))
    );
}

#[tokio::test]
async fn test_sheets_counts_rows() {
    let handler = SheetsHandler::new(Simulation::instant());
    let step = StepDescriptor::new("a2", "sheets").with_config("spreadsheetId", "ops");

    let first = handler
        .handle(create_test_context(step.clone(), Value::Null))
        .await
        .unwrap();
    let second = handler
        .handle(create_test_context(step, Value::Null))
        .await
        .unwrap();

    assert_eq!(first.get("spreadsheetId").and_then(|v| v.as_str()), Some("ops"));
    assert_eq!(first.get("rowNumber").and_then(|v| v.as_f64()), Some(2.0));
    assert_eq!(second.get("rowNumber").and_then(|v| v.as_f64()), Some(3.0));
}

#[tokio::test]
async fn test_forced_failure_message() {
    let handler = TrelloHandler::new(Simulation::instant().failing("board archived"));
    let step = StepDescriptor::new("a1", "trello");

    let result = handler.handle(create_test_context(step, Value::Null)).await;

    assert_eq!(result, Err(StepError::failed("board archived")));
}

#[tokio::test]
async fn test_certain_failure_rate_always_fails() {
    let handler = GmailHandler::new(Simulation::instant().with_failure_rate(1.0));
    let step = StepDescriptor::new("t1", "gmail").with_action("New Email");

    let result = handler.handle(create_test_context(step, Value::Null)).await;

    assert_eq!(result, Err(StepError::failed("New Email request failed")));
}

#[tokio::test]
async fn test_cancelled_call_stops_early() {
    let handler = GmailHandler::new(
        Simulation::default().with_latency(Duration::from_secs(30), Duration::from_secs(30)),
    );
    let ctx = create_test_context(StepDescriptor::new("t1", "gmail"), Value::Null);
    ctx.cancellation.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), handler.handle(ctx))
        .await
        .expect("cancelled call should return promptly");

    assert_eq!(result, Err(StepError::Cancelled));
}

#[test]
fn test_register_all() {
    let registry = registry_with(Simulation::instant());

    assert_eq!(
        registry.list_app_ids(),
        vec!["gmail", "sheets", "slack", "trello"]
    );
    assert_eq!(registry.resolve("asana").app_id(), "generic");
    assert_eq!(registry.fallback_metadata().category, "general");
    assert_eq!(
        registry.get_metadata("slack").map(|m| m.category),
        Some("chat".to_string())
    );
}

#[tokio::test]
async fn test_gmail_to_slack_completes() {
    let engine = ExecutionEngine::with_registry(
        Arc::new(registry_with(
            Simulation::default()
                .with_latency(Duration::from_millis(2), Duration::from_millis(5))
                .succeeding(),
        )),
        EngineConfig::default(),
    );
    let steps = vec![
        StepDescriptor::new("t1", "gmail"),
        StepDescriptor::new("a1", "slack"),
    ];

    let execution = engine.execute_workflow("zap-1", steps, None).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.steps[0].status, StepStatus::Completed);
    assert_eq!(execution.steps[1].status, StepStatus::Completed);
    assert!(execution.total_execution_time_ms.unwrap() > 0);
}

#[tokio::test]
async fn test_slack_rate_limited() {
    let mut registry = registry_with(Simulation::instant());
    registry.register(Arc::new(SlackHandler::new(
        Simulation::instant().failing("rate limited"),
    )));
    let engine = ExecutionEngine::with_registry(Arc::new(registry), EngineConfig::default());
    let steps = vec![
        StepDescriptor::new("t1", "gmail"),
        StepDescriptor::new("a1", "slack"),
    ];

    let execution = engine.execute_workflow("zap-1", steps, None).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.steps.len(), 2);
    assert_eq!(execution.steps[1].status, StepStatus::Failed);
    assert_eq!(execution.steps[1].error.as_deref(), Some("rate limited"));
}

#[tokio::test]
async fn test_generic_fallback_labels_app() {
    let registry = registry_with(Simulation::instant());
    let mut config = HashMap::new();
    config.insert("list".to_string(), Value::from("ignored"));
    let step = StepDescriptor {
        id: "a9".to_string(),
        app_id: "hubspot".to_string(),
        action_name: "Create Contact".to_string(),
        config,
    };

    let output = registry
        .resolve(&step.app_id)
        .handle(create_test_context(step, Value::Null))
        .await
        .unwrap();

    assert_eq!(output.get("app").and_then(|v| v.as_str()), Some("hubspot"));
    assert_eq!(output.get("action").and_then(|v| v.as_str()), Some("Create Contact"));
}
