use crate::simulate::Simulation;
use async_trait::async_trait;
use zapcore::{HandlerMetadata, StepContext, StepError, StepHandler, Value};

/// Fallback for apps without a dedicated handler.
pub struct GenericHandler {
    simulation: Simulation,
}

impl GenericHandler {
    pub fn new(simulation: Simulation) -> Self {
        Self { simulation }
    }
}

#[async_trait]
impl StepHandler for GenericHandler {
    fn app_id(&self) -> &str {
        "generic"
    }

    async fn handle(&self, ctx: StepContext) -> Result<Value, StepError> {
        self.simulation.call(&ctx).await?;

        Ok(ctx.input.merged_with(Value::object([
            ("app", Value::from(ctx.step.app_id.as_str())),
            ("action", Value::from(ctx.step.display_name())),
            ("status", Value::from("ok")),
        ])))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Simulated call for any other app".to_string(),
            category: "general".to_string(),
        }
    }
}
