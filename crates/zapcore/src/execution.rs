//! Run records produced by the execution engine.
//!
//! An [`Execution`] is created when a run starts and is mutated only by the
//! run loop that owns it. Consumers read cloned snapshots.

use crate::{StepDescriptor, StepId, Value, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Per-step lifecycle: `pending -> running -> completed | failed`, or
/// `pending -> skipped` when the run gives up on the rest of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Completed or failed: the step has been fully processed.
    pub fn is_processed(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

/// Run-level aggregate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Paused,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Paused => "paused",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// Outcome of one step within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub step_id: StepId,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    pub fn running(step_id: impl Into<StepId>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Running,
            data: None,
            error: None,
            execution_time_ms: 0,
        }
    }

    pub fn skipped(step_id: impl Into<StepId>) -> Self {
        Self {
            status: StepStatus::Skipped,
            ..Self::running(step_id)
        }
    }

    pub fn complete(&mut self, data: Value, execution_time_ms: u64) {
        self.status = StepStatus::Completed;
        self.data = Some(data);
        self.error = None;
        self.execution_time_ms = execution_time_ms;
    }

    pub fn fail(&mut self, error: impl Into<String>, execution_time_ms: u64) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.execution_time_ms = execution_time_ms;
    }
}

/// One attempt at running a workflow's steps to a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub steps: Vec<ExecutionResult>,
    /// Number of steps the run was started with.
    pub total_steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_execution_time_ms: Option<u64>,
    /// Run-level failure not attributable to a single step (e.g. a stop request).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Execution {
    pub fn start(workflow_id: impl Into<WorkflowId>, total_steps: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            steps: Vec::with_capacity(total_steps),
            total_steps,
            total_execution_time_ms: None,
            error: None,
        }
    }

    /// Move to a terminal status, stamping the end time and total duration.
    pub fn finish(&mut self, status: ExecutionStatus) {
        debug_assert!(status.is_terminal());
        let end = Utc::now().max(self.start_time);
        self.status = status;
        self.end_time = Some(end);
        self.total_execution_time_ms = Some((end - self.start_time).num_milliseconds().max(0) as u64);
    }

    pub fn result(&self, step_id: &str) -> Option<&ExecutionResult> {
        self.steps.iter().find(|r| r.step_id == step_id)
    }

    pub fn failed_step(&self) -> Option<&ExecutionResult> {
        self.steps.iter().find(|r| r.status == StepStatus::Failed)
    }

    pub fn processed_steps(&self) -> usize {
        self.steps.iter().filter(|r| r.status.is_processed()).count()
    }

    /// Percentage of steps fully processed (completed or failed).
    pub fn progress(&self) -> f64 {
        crate::status::progress_percent(self.processed_steps(), self.total_steps)
    }

    /// Reset every failed result to pending and clear its error so a later
    /// run can attempt it again. Completed results are left untouched.
    /// Returns how many results were reset; nothing is re-run here.
    pub fn retry_failed_steps(&mut self) -> usize {
        let mut reset = 0;
        for result in self.steps.iter_mut().filter(|r| r.status == StepStatus::Failed) {
            result.status = StepStatus::Pending;
            result.error = None;
            reset += 1;
        }
        reset
    }

    /// Steps from `steps` that this run has not completed, in their original
    /// order. Feed these to a new run to finish the workflow.
    pub fn remaining_steps<'a>(&self, steps: &'a [StepDescriptor]) -> Vec<&'a StepDescriptor> {
        steps
            .iter()
            .filter(|step| {
                !matches!(self.result(&step.id), Some(r) if r.status == StepStatus::Completed)
            })
            .collect()
    }
}
