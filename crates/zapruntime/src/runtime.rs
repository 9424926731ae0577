use crate::control::{RunControl, RunProgress, RunState};
use crate::executor::{RunContext, StepExecutor};
use crate::history::{ExecutionRepository, ExecutionStore};
use crate::registry::HandlerRegistry;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use zapcore::{
    validate_steps, EventBus, Execution, ExecutionEvent, ExecutionId, ExecutionStatus,
    StepDescriptor, Value, WorkflowError, WorkflowId, ZapError,
};

/// What a run does after a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    /// Halt; later steps stay pending and get no result.
    #[default]
    StopWorkflow,
    /// Halt and record every later step as skipped.
    SkipRemaining,
    /// Keep going with the last successful output. The run still ends failed.
    ContinueOnError,
}

/// Configuration for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub event_buffer_size: usize,
    pub on_error: ErrorHandling,
    /// No limit when unset; a hanging handler then stalls its run.
    pub step_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            on_error: ErrorHandling::StopWorkflow,
            step_timeout: None,
        }
    }
}

/// A run's control while it is live, its final progress once it is done.
#[derive(Clone)]
enum Tracked {
    Live(RunControl),
    Finished(RunProgress),
}

/// Owns every run started in this session.
///
/// Cloning is cheap and clones share state, so a clone can pause or stop a
/// run another clone is awaiting. Runs of the same workflow are not
/// serialized here; callers that need that should await one before
/// starting the next.
#[derive(Clone)]
pub struct ExecutionEngine {
    registry: Arc<HandlerRegistry>,
    executor: Arc<StepExecutor>,
    event_bus: Arc<EventBus>,
    store: Arc<RwLock<ExecutionStore>>,
    controls: Arc<Mutex<HashMap<ExecutionId, Tracked>>>,
    repository: Option<Arc<dyn ExecutionRepository>>,
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_registry(Arc::new(HandlerRegistry::new()), config)
    }

    pub fn with_registry(registry: Arc<HandlerRegistry>, config: EngineConfig) -> Self {
        Self {
            registry,
            executor: Arc::new(StepExecutor::new(config.on_error, config.step_timeout)),
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
            store: Arc::new(RwLock::new(ExecutionStore::default())),
            controls: Arc::new(Mutex::new(HashMap::new())),
            repository: None,
        }
    }

    /// Save every finished run through `repository`.
    pub fn with_repository(mut self, repository: Arc<dyn ExecutionRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Run `steps` in order and return the finished execution.
    ///
    /// Rejects an invalid step list before any execution is created. Step
    /// failures are reported through the returned execution's status.
    pub async fn execute_workflow(
        &self,
        workflow_id: impl Into<WorkflowId>,
        steps: Vec<StepDescriptor>,
        input: Option<Value>,
    ) -> Result<Execution, ZapError> {
        let (execution, control) = self.prepare(workflow_id.into(), &steps).await?;
        Ok(self.drive(execution, steps, input, control).await)
    }

    /// Like [`execute_workflow`](Self::execute_workflow), but runs on a
    /// spawned task and hands back a handle for controlling it.
    pub async fn start_workflow(
        &self,
        workflow_id: impl Into<WorkflowId>,
        steps: Vec<StepDescriptor>,
        input: Option<Value>,
    ) -> Result<ExecutionHandle, ZapError> {
        let (execution, control) = self.prepare(workflow_id.into(), &steps).await?;
        let execution_id = execution.id;
        let engine = self.clone();
        let task_control = control.clone();
        let join = tokio::spawn(async move { engine.drive(execution, steps, input, task_control).await });

        Ok(ExecutionHandle {
            execution_id,
            control,
            engine: self.clone(),
            join,
        })
    }

    async fn prepare(
        &self,
        workflow_id: WorkflowId,
        steps: &[StepDescriptor],
    ) -> Result<(Execution, RunControl), ZapError> {
        validate_steps(steps)?;

        let execution = Execution::start(workflow_id, steps.len());
        let control = RunControl::new(steps.len());
        control.begin();
        self.controls
            .lock()
            .await
            .insert(execution.id, Tracked::Live(control.clone()));
        self.store.write().await.insert_current(execution.clone());
        Ok((execution, control))
    }

    async fn drive(
        &self,
        execution: Execution,
        steps: Vec<StepDescriptor>,
        input: Option<Value>,
        control: RunControl,
    ) -> Execution {
        let ctx = RunContext {
            registry: &self.registry,
            events: &self.event_bus,
            store: &self.store,
            control: &control,
        };
        let execution = self
            .executor
            .run(execution, &steps, input.unwrap_or_default(), ctx)
            .await;
        self.retire(execution.id, &control).await;

        if let Some(repository) = &self.repository {
            if let Err(e) = repository.save(&execution).await {
                tracing::warn!(execution_id = %execution.id, "Failed to save execution: {}", e);
            }
        }
        execution
    }

    /// Pause a running execution. The step in flight finishes; the next one
    /// waits for [`resume_execution`](Self::resume_execution). Returns
    /// false for unknown or non-running executions.
    pub async fn pause_execution(&self, execution_id: ExecutionId) -> bool {
        let Some(control) = self.control(execution_id).await else {
            return false;
        };
        let mut store = self.store.write().await;
        let Some(record) = store.get_mut(&execution_id) else {
            return false;
        };
        if record.status != ExecutionStatus::Running || !control.pause() {
            return false;
        }
        record.status = ExecutionStatus::Paused;
        drop(store);

        tracing::info!(%execution_id, "Run paused");
        self.event_bus.emit(ExecutionEvent::RunPaused {
            execution_id,
            timestamp: Utc::now(),
        });
        true
    }

    /// Resume a paused execution. Returns false for unknown or non-paused
    /// executions.
    pub async fn resume_execution(&self, execution_id: ExecutionId) -> bool {
        let Some(control) = self.control(execution_id).await else {
            return false;
        };
        let mut store = self.store.write().await;
        let Some(record) = store.get_mut(&execution_id) else {
            return false;
        };
        if record.status != ExecutionStatus::Paused || !control.resume() {
            return false;
        }
        record.status = ExecutionStatus::Running;
        drop(store);

        tracing::info!(%execution_id, "Run resumed");
        self.event_bus.emit(ExecutionEvent::RunResumed {
            execution_id,
            timestamp: Utc::now(),
        });
        true
    }

    /// Stop an execution: the in-flight handler is cancelled, no further
    /// steps are dispatched and the run ends failed.
    pub async fn stop_execution(&self, execution_id: ExecutionId) -> bool {
        match self.control(execution_id).await {
            Some(control) => control.stop(),
            None => false,
        }
    }

    /// Reset the failed steps of a stored execution to pending. Returns the
    /// number reset, or `None` if the execution is unknown. Nothing is
    /// re-run; submit [`Execution::remaining_steps`] to a new run for that.
    pub async fn retry_failed_steps(&self, execution_id: ExecutionId) -> Option<usize> {
        let mut store = self.store.write().await;
        let record = store.get_mut(&execution_id)?;
        if !record.status.is_terminal() {
            return Some(0);
        }
        Some(record.retry_failed_steps())
    }

    /// Start a new run over the steps `execution_id` did not complete.
    pub async fn rerun_remaining(
        &self,
        execution_id: ExecutionId,
        steps: &[StepDescriptor],
        input: Option<Value>,
    ) -> Result<Execution, ZapError> {
        let previous = self
            .get_execution(execution_id)
            .await
            .ok_or(WorkflowError::ExecutionNotFound(execution_id))?;
        let remaining: Vec<StepDescriptor> = previous
            .remaining_steps(steps)
            .into_iter()
            .cloned()
            .collect();
        self.execute_workflow(previous.workflow_id, remaining, input).await
    }

    pub async fn get_execution(&self, execution_id: ExecutionId) -> Option<Execution> {
        self.store.read().await.get(&execution_id).cloned()
    }

    /// Every execution started in this session, oldest first.
    pub async fn list_executions(&self) -> Vec<Execution> {
        self.store.read().await.iter().cloned().collect()
    }

    pub async fn list_for_workflow(&self, workflow_id: &str) -> Vec<Execution> {
        self.store
            .read()
            .await
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    /// The most recently started execution.
    pub async fn current_execution(&self) -> Option<Execution> {
        self.store.read().await.current().cloned()
    }

    pub async fn progress(&self, execution_id: ExecutionId) -> Option<RunProgress> {
        match self.controls.lock().await.get(&execution_id)? {
            Tracked::Live(control) => Some(control.progress()),
            Tracked::Finished(progress) => Some(*progress),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Mark a run failed when its loop died without finishing the record.
    async fn force_fail(&self, execution_id: ExecutionId, error: String) {
        if let Some(control) = self.control(execution_id).await {
            control.finish(RunState::Failed);
            self.retire(execution_id, &control).await;
        }
        let mut store = self.store.write().await;
        let Some(record) = store.get_mut(&execution_id) else {
            return;
        };
        if record.status.is_terminal() {
            return;
        }
        record.error = Some(error.clone());
        record.finish(ExecutionStatus::Failed);
        let duration_ms = record.total_execution_time_ms.unwrap_or_default();
        drop(store);

        tracing::error!(%execution_id, "Run aborted: {}", error);
        self.event_bus.emit(ExecutionEvent::RunFailed {
            execution_id,
            step_id: None,
            error,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    /// Drop a finished run's control, keeping only its final progress.
    async fn retire(&self, execution_id: ExecutionId, control: &RunControl) {
        self.controls
            .lock()
            .await
            .insert(execution_id, Tracked::Finished(control.progress()));
    }

    async fn control(&self, execution_id: ExecutionId) -> Option<RunControl> {
        match self.controls.lock().await.get(&execution_id)? {
            Tracked::Live(control) => Some(control.clone()),
            Tracked::Finished(_) => None,
        }
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a run started with [`ExecutionEngine::start_workflow`].
pub struct ExecutionHandle {
    pub execution_id: ExecutionId,
    control: RunControl,
    engine: ExecutionEngine,
    join: JoinHandle<Execution>,
}

impl ExecutionHandle {
    pub async fn pause(&self) -> bool {
        self.engine.pause_execution(self.execution_id).await
    }

    pub async fn resume(&self) -> bool {
        self.engine.resume_execution(self.execution_id).await
    }

    pub fn stop(&self) -> bool {
        self.control.stop()
    }

    pub fn progress(&self) -> RunProgress {
        self.control.progress()
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    /// Current snapshot of the run.
    pub async fn snapshot(&self) -> Option<Execution> {
        self.engine.get_execution(self.execution_id).await
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<Execution, ZapError> {
        match self.join.await {
            Ok(execution) => Ok(execution),
            Err(e) => {
                let error = format!("Run task failed: {}", e);
                self.engine.force_fail(self.execution_id, error.clone()).await;
                Err(ZapError::Execution(error))
            }
        }
    }
}
