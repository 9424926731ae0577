use crate::simulate::Simulation;
use async_trait::async_trait;
use zapcore::{HandlerMetadata, StepContext, StepError, StepHandler, Value};

/// Simulated Trello: creates a card on a list.
pub struct TrelloHandler {
    simulation: Simulation,
}

impl TrelloHandler {
    pub fn new(simulation: Simulation) -> Self {
        Self { simulation }
    }
}

#[async_trait]
impl StepHandler for TrelloHandler {
    fn app_id(&self) -> &str {
        "trello"
    }

    async fn handle(&self, ctx: StepContext) -> Result<Value, StepError> {
        self.simulation.call(&ctx).await?;

        let name = ctx
            .step
            .config
            .get("name")
            .or_else(|| ctx.input.get("subject"))
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled card")
            .to_string();
        let card_id = uuid::Uuid::new_v4().simple().to_string()[..24].to_string();

        let list = ctx.config_str_or("list", "To Do").to_string();

        Ok(ctx.input.merged_with(Value::object([
            ("cardId", Value::from(card_id)),
            ("list", Value::from(list)),
            ("name", Value::from(name)),
        ])))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Create cards on a board".to_string(),
            category: "project management".to_string(),
        }
    }
}
