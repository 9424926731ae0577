use crate::{ExecutionId, Notification, StepId, StepStatus, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted while a run progresses. The UI subscribes to these
/// instead of the engine pushing toasts directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    RunStarted {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        total_steps: usize,
        timestamp: DateTime<Utc>,
    },
    StepStatusChanged {
        execution_id: ExecutionId,
        step_id: StepId,
        app_id: String,
        status: StepStatus,
        timestamp: DateTime<Utc>,
    },
    Progress {
        execution_id: ExecutionId,
        processed: usize,
        total: usize,
        percent: f64,
        timestamp: DateTime<Utc>,
    },
    RunPaused {
        execution_id: ExecutionId,
        timestamp: DateTime<Utc>,
    },
    RunResumed {
        execution_id: ExecutionId,
        timestamp: DateTime<Utc>,
    },
    RunStopped {
        execution_id: ExecutionId,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        execution_id: ExecutionId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    RunFailed {
        execution_id: ExecutionId,
        step_id: Option<StepId>,
        error: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    Notification {
        execution_id: ExecutionId,
        notification: Notification,
        timestamp: DateTime<Utc>,
    },
    StepEvent {
        execution_id: ExecutionId,
        step_id: StepId,
        event: StepEvent,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            ExecutionEvent::RunStarted { execution_id, .. }
            | ExecutionEvent::StepStatusChanged { execution_id, .. }
            | ExecutionEvent::Progress { execution_id, .. }
            | ExecutionEvent::RunPaused { execution_id, .. }
            | ExecutionEvent::RunResumed { execution_id, .. }
            | ExecutionEvent::RunStopped { execution_id, .. }
            | ExecutionEvent::RunCompleted { execution_id, .. }
            | ExecutionEvent::RunFailed { execution_id, .. }
            | ExecutionEvent::Notification { execution_id, .. }
            | ExecutionEvent::StepEvent { execution_id, .. } => *execution_id,
        }
    }
}

/// Messages a handler reports while it works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum StepEvent {
    Info { message: String },
    Warning { message: String },
}

/// Handle given to step handlers for reporting progress messages.
#[derive(Clone)]
pub struct EventEmitter {
    execution_id: ExecutionId,
    step_id: StepId,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn new(
        execution_id: ExecutionId,
        step_id: StepId,
        sender: broadcast::Sender<ExecutionEvent>,
    ) -> Self {
        Self {
            execution_id,
            step_id,
            sender,
        }
    }

    pub fn emit(&self, event: StepEvent) {
        let _ = self.sender.send(ExecutionEvent::StepEvent {
            execution_id: self.execution_id,
            step_id: self.step_id.clone(),
            event,
            timestamp: Utc::now(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(StepEvent::Info {
            message: message.into(),
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(StepEvent::Warning {
            message: message.into(),
        });
    }
}

/// Fan-out of execution events to every subscriber. Sending with no
/// subscribers is not an error.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, execution_id: ExecutionId, step_id: StepId) -> EventEmitter {
        EventEmitter::new(execution_id, step_id, self.sender.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn emitter_tags_events_with_step() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let execution_id = Uuid::new_v4();

        bus.create_emitter(execution_id, "a1".to_string()).info("posting");

        match rx.recv().await.unwrap() {
            ExecutionEvent::StepEvent { step_id, event: StepEvent::Info { message }, .. } => {
                assert_eq!(step_id, "a1");
                assert_eq!(message, "posting");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new(1);
        bus.emit(ExecutionEvent::RunPaused {
            execution_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });
    }
}
