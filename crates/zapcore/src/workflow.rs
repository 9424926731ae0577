use crate::{Value, WorkflowError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Opaque identifier of a workflow definition (display/grouping only).
pub type WorkflowId = String;

/// Identifier of a step, unique within one workflow.
pub type StepId = String;

/// Serialized workflow: a trigger followed by actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepDescriptor>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<WorkflowId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: StepDescriptor) -> Self {
        self.steps.push(step);
        self
    }

    /// The first step, if any.
    pub fn trigger(&self) -> Option<&StepDescriptor> {
        self.steps.first()
    }

    /// Every step after the trigger.
    pub fn actions(&self) -> &[StepDescriptor] {
        self.steps.get(1..).unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        validate_steps(&self.steps)
    }
}

/// One unit of work, targeting an external application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepDescriptor {
    pub id: StepId,
    pub app_id: String,
    #[serde(default)]
    pub action_name: String,
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

impl StepDescriptor {
    pub fn new(id: impl Into<StepId>, app_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            app_id: app_id.into(),
            action_name: String::new(),
            config: HashMap::new(),
        }
    }

    pub fn with_action(mut self, action_name: impl Into<String>) -> Self {
        self.action_name = action_name.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Label shown to users, falling back to the app id.
    pub fn display_name(&self) -> &str {
        if self.action_name.is_empty() {
            &self.app_id
        } else {
            &self.action_name
        }
    }
}

/// Reject step lists that can't be run: empty, blank ids or duplicate ids.
pub fn validate_steps(steps: &[StepDescriptor]) -> Result<(), WorkflowError> {
    if steps.is_empty() {
        return Err(WorkflowError::EmptySteps);
    }

    let mut seen = HashSet::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        if step.id.trim().is_empty() {
            return Err(WorkflowError::Invalid(format!("step {} has an empty id", index)));
        }
        if step.app_id.trim().is_empty() {
            return Err(WorkflowError::Invalid(format!(
                "step '{}' has an empty app id",
                step.id
            )));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(WorkflowError::DuplicateStepId(step.id.clone()));
        }
    }

    Ok(())
}
