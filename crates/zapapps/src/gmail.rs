use crate::simulate::Simulation;
use async_trait::async_trait;
use zapcore::{HandlerMetadata, StepContext, StepError, StepHandler, Value};

/// Simulated Gmail: as a trigger it yields a new email, as an action it
/// "sends" one.
pub struct GmailHandler {
    simulation: Simulation,
}

impl GmailHandler {
    pub fn new(simulation: Simulation) -> Self {
        Self { simulation }
    }
}

#[async_trait]
impl StepHandler for GmailHandler {
    fn app_id(&self) -> &str {
        "gmail"
    }

    async fn handle(&self, ctx: StepContext) -> Result<Value, StepError> {
        self.simulation.call(&ctx).await?;

        let message_id = format!("msg_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        let subject = ctx.config_str_or("subject", "New message").to_string();
        let email = Value::object([
            ("messageId", Value::from(message_id)),
            ("from", Value::from(ctx.config_str_or("from", "customer@example.com"))),
            ("to", Value::from(ctx.config_str_or("to", "team@example.com"))),
            ("subject", Value::from(subject)),
        ]);

        Ok(ctx.input.merged_with(email))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Receive or send email".to_string(),
            category: "email".to_string(),
        }
    }
}
