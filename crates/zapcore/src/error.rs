use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ZapError {
    #[error("Step error: {0}")]
    Step(#[from] StepError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by (or on behalf of) a step handler.
///
/// The `Display` output is what lands in `ExecutionResult::error`, so
/// `Failed` renders the handler's message verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("Cancelled")]
    Cancelled,
}

impl StepError {
    pub fn failed(message: impl Into<String>) -> Self {
        StepError::Failed(message.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow has no steps")]
    EmptySteps,

    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),

    #[error("Invalid workflow: {0}")]
    Invalid(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(Uuid),
}
