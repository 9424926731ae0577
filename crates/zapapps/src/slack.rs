use crate::simulate::Simulation;
use async_trait::async_trait;
use chrono::Utc;
use zapcore::{HandlerMetadata, StepContext, StepError, StepHandler, Value};

/// Simulated Slack: posts a message to a channel.
pub struct SlackHandler {
    simulation: Simulation,
}

impl SlackHandler {
    pub fn new(simulation: Simulation) -> Self {
        Self { simulation }
    }
}

#[async_trait]
impl StepHandler for SlackHandler {
    fn app_id(&self) -> &str {
        "slack"
    }

    async fn handle(&self, ctx: StepContext) -> Result<Value, StepError> {
        let channel = ctx.config_str_or("channel", "#general").to_string();
        if !channel.starts_with('#') && !channel.starts_with('@') {
            return Err(StepError::Configuration(format!(
                "channel must start with '#' or '@', got '{}'",
                channel
            )));
        }

        self.simulation.call(&ctx).await?;

        // Prefer an explicit message, else echo the upstream subject.
        let text = ctx
            .step
            .config
            .get("message")
            .or_else(|| ctx.input.get("subject"))
            .and_then(|v| v.as_str())
            .unwrap_or("New Zap event")
            .to_string();
        let ts = message_ts();
        ctx.events.info(format!("Posted to {}", channel));

        Ok(ctx.input.merged_with(Value::object([
            ("channel", Value::from(channel)),
            ("text", Value::from(text)),
            ("ts", Value::from(ts)),
        ])))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Post messages to a Slack channel".to_string(),
            category: "chat".to_string(),
        }
    }
}

/// Slack-style message timestamp: seconds.micros since the epoch.
fn message_ts() -> String {
    let now = Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}
