//! Core types for the Zap execution model
//!
//! Step descriptors, run records, the handler capability, execution events
//! and the status read model. Nothing here drives a run; see `zapruntime`.

mod error;
pub mod events;
mod execution;
mod handler;
mod notification;
pub mod status;
mod value;
mod workflow;

pub use error::{StepError, WorkflowError, ZapError};
pub use events::{EventBus, EventEmitter, ExecutionEvent, StepEvent};
pub use execution::{Execution, ExecutionId, ExecutionResult, ExecutionStatus, StepStatus};
pub use handler::{HandlerMetadata, StepContext, StepHandler};
pub use notification::{Notification, NotificationLevel};
pub use status::{BadgeVariant, StatusIcon, StatusView};
pub use value::Value;
pub use workflow::{validate_steps, StepDescriptor, StepId, WorkflowDefinition, WorkflowId};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, ZapError>;
