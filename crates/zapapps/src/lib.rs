//! Built-in app handlers
//!
//! Simulated integrations for the apps the builder offers. Each one waits
//! out a randomized latency and returns a mock payload merged over its input.

mod generic;
mod gmail;
mod sheets;
mod simulate;
mod slack;
mod trello;

pub use generic::GenericHandler;
pub use gmail::GmailHandler;
pub use sheets::SheetsHandler;
pub use simulate::{Outcome, Simulation};
pub use slack::SlackHandler;
pub use trello::TrelloHandler;
use zapruntime::HandlerRegistry;

use std::sync::Arc;

/// Register every built-in handler, with `GenericHandler` as the fallback.
pub fn register_all(registry: &mut HandlerRegistry, simulation: &Simulation) {
    registry.register(Arc::new(GmailHandler::new(simulation.clone())));
    registry.register(Arc::new(SlackHandler::new(simulation.clone())));
    registry.register(Arc::new(SheetsHandler::new(simulation.clone())));
    registry.register(Arc::new(TrelloHandler::new(simulation.clone())));
    registry.set_fallback(Arc::new(GenericHandler::new(simulation.clone())));
}
