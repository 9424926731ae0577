//! Execution runtime for Zap workflows
//!
//! Resolves step handlers by app id, drives runs one step at a time, and
//! keeps the session's execution list with pause/resume/stop control.

mod control;
mod executor;
mod history;
mod registry;
mod runtime;

pub use control::{RunControl, RunProgress, RunState};
pub use history::{ExecutionRepository, InMemoryRepository};
pub use registry::HandlerRegistry;
pub use runtime::{EngineConfig, ErrorHandling, ExecutionEngine, ExecutionHandle};
