use crate::simulate::Simulation;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use zapcore::{HandlerMetadata, StepContext, StepError, StepHandler, Value};

/// Simulated Google Sheets: appends the incoming data as a row.
pub struct SheetsHandler {
    simulation: Simulation,
    next_row: AtomicU64,
}

impl SheetsHandler {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            simulation,
            // Row 1 holds the headers.
            next_row: AtomicU64::new(2),
        }
    }
}

#[async_trait]
impl StepHandler for SheetsHandler {
    fn app_id(&self) -> &str {
        "sheets"
    }

    async fn handle(&self, ctx: StepContext) -> Result<Value, StepError> {
        let spreadsheet_id = ctx
            .require_config("spreadsheetId")?
            .as_str()
            .ok_or_else(|| StepError::Configuration("spreadsheetId must be a string".to_string()))?
            .to_string();

        self.simulation.call(&ctx).await?;

        let row = self.next_row.fetch_add(1, Ordering::Relaxed);
        let sheet = ctx.config_str_or("sheet", "Sheet1").to_string();
        ctx.events.info(format!("Appended row {} to {}", row, sheet));

        Ok(ctx.input.merged_with(Value::object([
            ("spreadsheetId", Value::from(spreadsheet_id)),
            ("sheet", Value::from(sheet)),
            ("rowNumber", Value::from(row as f64)),
        ])))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Append rows to a spreadsheet".to_string(),
            category: "spreadsheets".to_string(),
        }
    }
}
