use crate::{events::EventEmitter, ExecutionId, StepDescriptor, StepError, Value};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Capability that performs a step against one external application.
///
/// Handlers are looked up by [`StepHandler::app_id`]. Returning `Err`
/// marks the step failed with the error's message; it never aborts the
/// engine.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// App key this handler serves (e.g. "gmail", "slack").
    fn app_id(&self) -> &str;

    /// Run the step. The returned value becomes the next step's input.
    async fn handle(&self, ctx: StepContext) -> Result<Value, StepError>;

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::default()
    }
}

/// Everything a handler gets to see for one invocation.
#[derive(Clone)]
pub struct StepContext {
    pub execution_id: ExecutionId,

    pub step: StepDescriptor,

    /// Output of the previous step, or the run's initial input for the trigger.
    pub input: Value,

    pub events: EventEmitter,

    /// Cancelled when the run is stopped; long-running handlers should
    /// watch it and bail out with `StepError::Cancelled`.
    pub cancellation: CancellationToken,
}

impl StepContext {
    pub fn require_config(&self, name: &str) -> Result<&Value, StepError> {
        self.step
            .config
            .get(name)
            .ok_or_else(|| StepError::Configuration(format!("Missing config: {}", name)))
    }

    pub fn config_str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.step
            .config
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
    }
}

#[derive(Debug, Clone)]
pub struct HandlerMetadata {
    pub description: String,
    pub category: String,
}

impl Default for HandlerMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}
