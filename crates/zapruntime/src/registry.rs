use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use zapcore::{HandlerMetadata, StepContext, StepError, StepHandler, Value};

/// Lookup table from app id to handler, with a fallback for apps nobody
/// registered. Adding an integration means registering a handler here.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
    fallback: Arc<dyn StepHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(PassthroughHandler),
        }
    }

    /// Register a handler under its own app id, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn StepHandler>) {
        let app_id = handler.app_id().to_string();
        tracing::info!("Registering step handler: {}", app_id);
        self.handlers.insert(app_id, handler);
    }

    /// Handler used for app ids with no registration.
    pub fn set_fallback(&mut self, handler: Arc<dyn StepHandler>) {
        self.fallback = handler;
    }

    pub fn with_fallback(mut self, handler: Arc<dyn StepHandler>) -> Self {
        self.set_fallback(handler);
        self
    }

    /// Always yields a handler: the registered one, or the fallback.
    pub fn resolve(&self, app_id: &str) -> Arc<dyn StepHandler> {
        match self.handlers.get(app_id) {
            Some(handler) => handler.clone(),
            None => {
                tracing::debug!("No handler for app '{}', using fallback", app_id);
                self.fallback.clone()
            }
        }
    }

    pub fn is_registered(&self, app_id: &str) -> bool {
        self.handlers.contains_key(app_id)
    }

    /// Registered app ids, sorted.
    pub fn list_app_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn get_metadata(&self, app_id: &str) -> Option<HandlerMetadata> {
        self.handlers.get(app_id).map(|h| h.metadata())
    }

    pub fn fallback_metadata(&self) -> HandlerMetadata {
        self.fallback.metadata()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback of last resort: hands its input straight through.
struct PassthroughHandler;

#[async_trait]
impl StepHandler for PassthroughHandler {
    fn app_id(&self) -> &str {
        "passthrough"
    }

    async fn handle(&self, ctx: StepContext) -> Result<Value, StepError> {
        Ok(ctx.input)
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Passes input through unchanged".to_string(),
            category: "builtin".to_string(),
        }
    }
}
