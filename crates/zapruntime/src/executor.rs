use crate::control::{RunControl, RunState};
use crate::history::ExecutionStore;
use crate::registry::HandlerRegistry;
use crate::runtime::ErrorHandling;
use chrono::Utc;
use std::any::Any;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use zapcore::{
    EventBus, Execution, ExecutionEvent, ExecutionResult, ExecutionStatus, Notification,
    StepContext, StepDescriptor, StepError, StepStatus, Value,
};

/// Shared pieces a run loop reads from and reports into.
pub(crate) struct RunContext<'a> {
    pub registry: &'a HandlerRegistry,
    pub events: &'a EventBus,
    pub store: &'a RwLock<ExecutionStore>,
    pub control: &'a RunControl,
}

/// Runs a step list strictly in order, one step in flight at a time.
pub(crate) struct StepExecutor {
    on_error: ErrorHandling,
    step_timeout: Option<Duration>,
}

impl StepExecutor {
    pub(crate) fn new(on_error: ErrorHandling, step_timeout: Option<Duration>) -> Self {
        Self {
            on_error,
            step_timeout,
        }
    }

    /// Drive `execution` through `steps` until every step is processed, a
    /// step fails (per the error policy) or the run is stopped. Step
    /// failures are recorded on the returned execution, never returned as
    /// errors.
    pub(crate) async fn run(
        &self,
        mut execution: Execution,
        steps: &[StepDescriptor],
        input: Value,
        ctx: RunContext<'_>,
    ) -> Execution {
        let execution_id = execution.id;

        ctx.events.emit(ExecutionEvent::RunStarted {
            execution_id,
            workflow_id: execution.workflow_id.clone(),
            total_steps: steps.len(),
            timestamp: Utc::now(),
        });
        tracing::info!(%execution_id, workflow_id = %execution.workflow_id, steps = steps.len(), "Starting run");
        self.publish(&mut execution, &ctx).await;

        let mut input = input;
        let mut any_failed = false;
        let mut stopped = false;

        for (index, step) in steps.iter().enumerate() {
            if ctx.control.wait_while_paused().await.is_err() {
                stopped = true;
                break;
            }

            ctx.control.enter_step(index);
            execution.steps.push(ExecutionResult::running(step.id.clone()));
            self.emit_step_status(&ctx, execution_id, step, StepStatus::Running);
            self.publish(&mut execution, &ctx).await;

            tracing::debug!(%execution_id, step_id = %step.id, app_id = %step.app_id, "Dispatching step");
            let started = Instant::now();
            let outcome = self.invoke(&execution, step, input.clone(), &ctx).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let status = match execution.steps.last_mut() {
                Some(result) => {
                    match outcome {
                        Ok(data) => {
                            tracing::info!(%execution_id, step_id = %step.id, "Step completed in {}ms", elapsed_ms);
                            result.complete(data.clone(), elapsed_ms);
                            input = data;
                        }
                        Err(e) => {
                            tracing::error!(%execution_id, step_id = %step.id, "Step failed: {}", e);
                            result.fail(e.to_string(), elapsed_ms);
                        }
                    }
                    result.status
                }
                None => StepStatus::Failed,
            };

            let progress = ctx.control.advance(index);
            self.emit_step_status(&ctx, execution_id, step, status);
            ctx.events.emit(ExecutionEvent::Progress {
                execution_id,
                processed: progress.processed,
                total: progress.total,
                percent: progress.percent(),
                timestamp: Utc::now(),
            });
            self.publish(&mut execution, &ctx).await;

            if status != StepStatus::Failed {
                continue;
            }
            any_failed = true;

            if ctx.control.is_stopped() {
                stopped = true;
                break;
            }

            match self.on_error {
                ErrorHandling::StopWorkflow => break,
                ErrorHandling::SkipRemaining => {
                    for rest in &steps[index + 1..] {
                        execution.steps.push(ExecutionResult::skipped(rest.id.clone()));
                        self.emit_step_status(&ctx, execution_id, rest, StepStatus::Skipped);
                    }
                    break;
                }
                ErrorHandling::ContinueOnError => {
                    tracing::warn!(%execution_id, step_id = %step.id, "Continuing after failed step");
                }
            }
        }

        if stopped {
            tracing::warn!(%execution_id, "Run stopped");
            ctx.control.reset_progress();
            execution.error = Some("Execution stopped".to_string());
            ctx.events.emit(ExecutionEvent::RunStopped {
                execution_id,
                timestamp: Utc::now(),
            });
        }

        let (status, state) = if stopped || any_failed {
            (ExecutionStatus::Failed, RunState::Failed)
        } else {
            (ExecutionStatus::Completed, RunState::Completed)
        };
        execution.finish(status);
        ctx.control.finish(state);
        ctx.store.write().await.put(execution.clone());

        self.emit_terminal(&ctx, &execution);
        execution
    }

    /// The run's single suspension point: call the step's handler on its
    /// own task, racing stop requests and the optional step timeout.
    async fn invoke(
        &self,
        execution: &Execution,
        step: &StepDescriptor,
        input: Value,
        ctx: &RunContext<'_>,
    ) -> Result<Value, StepError> {
        let handler = ctx.registry.resolve(&step.app_id);
        let token = ctx.control.cancellation().clone();
        let step_ctx = StepContext {
            execution_id: execution.id,
            step: step.clone(),
            input,
            events: ctx.events.create_emitter(execution.id, step.id.clone()),
            cancellation: token.child_token(),
        };

        let mut task = tokio::spawn(async move { handler.handle(step_ctx).await });
        let step_timeout = self.step_timeout;
        let deadline = async move {
            match step_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                task.abort();
                Err(StepError::Cancelled)
            }
            _ = deadline => {
                task.abort();
                Err(StepError::Timeout {
                    millis: step_timeout.map(|d| d.as_millis() as u64).unwrap_or_default(),
                })
            }
            joined = &mut task => match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => Err(StepError::Panicked(panic_message(e.into_panic()))),
                Err(_) => Err(StepError::Cancelled),
            }
        }
    }

    /// Store a snapshot. Non-terminal records take their status from the
    /// run control so a pause is visible to readers.
    async fn publish(&self, execution: &mut Execution, ctx: &RunContext<'_>) {
        // Read the control state under the store lock; pause/resume update
        // both while holding it.
        let mut store = ctx.store.write().await;
        if !execution.status.is_terminal() {
            execution.status = ctx.control.execution_status();
        }
        store.put(execution.clone());
    }

    fn emit_step_status(
        &self,
        ctx: &RunContext<'_>,
        execution_id: zapcore::ExecutionId,
        step: &StepDescriptor,
        status: StepStatus,
    ) {
        ctx.events.emit(ExecutionEvent::StepStatusChanged {
            execution_id,
            step_id: step.id.clone(),
            app_id: step.app_id.clone(),
            status,
            timestamp: Utc::now(),
        });
    }

    /// One lifecycle event and exactly one notification per finished run.
    fn emit_terminal(&self, ctx: &RunContext<'_>, execution: &Execution) {
        let duration_ms = execution.total_execution_time_ms.unwrap_or_default();
        match execution.status {
            ExecutionStatus::Completed => {
                tracing::info!(execution_id = %execution.id, "Run completed in {}ms", duration_ms);
                ctx.events.emit(ExecutionEvent::RunCompleted {
                    execution_id: execution.id,
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
            _ => {
                let failed = execution.failed_step();
                let error = failed
                    .and_then(|r| r.error.clone())
                    .or_else(|| execution.error.clone())
                    .unwrap_or_else(|| "Execution failed".to_string());
                tracing::error!(execution_id = %execution.id, "Run failed after {}ms: {}", duration_ms, error);
                ctx.events.emit(ExecutionEvent::RunFailed {
                    execution_id: execution.id,
                    step_id: failed.map(|r| r.step_id.clone()),
                    error,
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
        }

        if let Some(notification) = Notification::for_execution(execution) {
            ctx.events.emit(ExecutionEvent::Notification {
                execution_id: execution.id,
                notification,
                timestamp: Utc::now(),
            });
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
