use crate::{Execution, ExecutionStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// User-facing summary of a finished run (rendered as a toast by the UI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub level: NotificationLevel,
}

impl Notification {
    /// Summarize a terminal execution. Returns `None` while the run is
    /// still active.
    pub fn for_execution(execution: &Execution) -> Option<Self> {
        let took = execution.total_execution_time_ms.unwrap_or_default();
        match execution.status {
            ExecutionStatus::Completed => Some(Self {
                title: "Workflow completed".to_string(),
                description: format!(
                    "{} steps completed in {}ms",
                    execution.steps.len(),
                    took
                ),
                level: NotificationLevel::Info,
            }),
            ExecutionStatus::Failed => {
                let reason = execution
                    .failed_step()
                    .map(|r| {
                        format!(
                            "Step '{}' failed: {}",
                            r.step_id,
                            r.error.as_deref().unwrap_or("unknown error")
                        )
                    })
                    .or_else(|| execution.error.clone())
                    .unwrap_or_else(|| "Execution failed".to_string());
                Some(Self {
                    title: "Workflow failed".to_string(),
                    description: format!("{} after {}ms", reason, took),
                    level: NotificationLevel::Error,
                })
            }
            ExecutionStatus::Running | ExecutionStatus::Paused => None,
        }
    }
}
