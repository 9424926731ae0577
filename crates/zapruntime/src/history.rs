use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use zapcore::{Execution, ExecutionId, ZapError};

/// Where finished runs go when the caller wants history beyond the
/// engine's own session list.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn save(&self, execution: &Execution) -> Result<(), ZapError>;

    /// Saved runs for one workflow, oldest first.
    async fn list(&self, workflow_id: &str) -> Result<Vec<Execution>, ZapError>;
}

/// Repository kept in process memory.
#[derive(Default)]
pub struct InMemoryRepository {
    executions: RwLock<Vec<Execution>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.executions.read().await.len()
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryRepository {
    async fn save(&self, execution: &Execution) -> Result<(), ZapError> {
        let mut executions = self.executions.write().await;
        match executions.iter_mut().find(|e| e.id == execution.id) {
            Some(existing) => *existing = execution.clone(),
            None => executions.push(execution.clone()),
        }
        Ok(())
    }

    async fn list(&self, workflow_id: &str) -> Result<Vec<Execution>, ZapError> {
        let executions = self.executions.read().await;
        Ok(executions
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect())
    }
}

/// The engine's session list of runs plus the "current" pointer. Runs are
/// kept in start order.
#[derive(Default)]
pub(crate) struct ExecutionStore {
    order: Vec<ExecutionId>,
    records: HashMap<ExecutionId, Execution>,
    current: Option<ExecutionId>,
}

impl ExecutionStore {
    pub(crate) fn insert_current(&mut self, execution: Execution) {
        let id = execution.id;
        self.order.push(id);
        self.records.insert(id, execution);
        self.current = Some(id);
    }

    pub(crate) fn put(&mut self, execution: Execution) {
        if !self.records.contains_key(&execution.id) {
            self.order.push(execution.id);
        }
        self.records.insert(execution.id, execution);
    }

    pub(crate) fn get(&self, id: &ExecutionId) -> Option<&Execution> {
        self.records.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &ExecutionId) -> Option<&mut Execution> {
        self.records.get_mut(id)
    }

    pub(crate) fn current(&self) -> Option<&Execution> {
        self.current.as_ref().and_then(|id| self.records.get(id))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Execution> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }
}
