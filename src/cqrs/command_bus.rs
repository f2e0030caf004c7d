use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::event_sourcing::core::EsResult;
use crate::metrics::{Metrics, OUTCOME_FAILED, OUTCOME_OK, OUTCOME_REJECTED};
use super::registry::HandlerRegistry;

// ============================================================================
// Command Bus
// ============================================================================
//
// Flow: lookup handler → validate → handle
//
// A command that fails validation never reaches its handler. Dispatch runs
// on the caller's task; safety between concurrent commands on the same
// aggregate comes only from the event store's version check.
//
// ============================================================================

/// A self-validating request to change one aggregate.
pub trait Command: Send + 'static {
    /// Routing key, unique per bus (e.g. `"user.change_email"`).
    const NAME: &'static str;

    fn aggregate_id(&self) -> &str;

    /// Reject structurally invalid input before any handler runs.
    fn validate(&self) -> EsResult<()>;

    fn command_name(&self) -> &'static str {
        Self::NAME
    }
}

#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, command: C) -> EsResult<()>;
}

pub struct CommandBus {
    handlers: HandlerRegistry,
    metrics: Option<Arc<Metrics>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        Self {
            handlers: HandlerRegistry::new("command"),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register the single handler for `C`. A second registration under
    /// the same name is a configuration error.
    pub fn register_handler<C, H>(&mut self, handler: H) -> EsResult<()>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let handler: Arc<dyn CommandHandler<C>> = Arc::new(handler);
        self.handlers.insert(C::NAME, handler)
    }

    /// Startup check that a handler for `C` is present.
    pub fn require<C: Command>(&self) -> EsResult<()> {
        self.handlers.get::<Arc<dyn CommandHandler<C>>>(C::NAME).map(|_| ())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains(name)
    }

    pub fn registered_commands(&self) -> Vec<&'static str> {
        self.handlers.names()
    }

    pub async fn dispatch<C: Command>(&self, command: C) -> EsResult<()> {
        let started = Instant::now();
        let handler = Arc::clone(self.handlers.get::<Arc<dyn CommandHandler<C>>>(command.command_name())?);

        if let Err(err) = command.validate() {
            tracing::debug!(
                command = C::NAME,
                aggregate_id = %command.aggregate_id(),
                error = %err,
                "Command rejected by validation"
            );
            self.record(C::NAME, OUTCOME_REJECTED, started);
            return Err(err);
        }

        let aggregate_id = command.aggregate_id().to_string();
        let result = handler.handle(command).await;

        match &result {
            Ok(()) => {
                tracing::debug!(command = C::NAME, aggregate_id = %aggregate_id, "Command handled");
                self.record(C::NAME, OUTCOME_OK, started);
            }
            Err(err) => {
                tracing::warn!(
                    command = C::NAME,
                    aggregate_id = %aggregate_id,
                    error = %err,
                    "Command failed"
                );
                self.record(C::NAME, OUTCOME_FAILED, started);
            }
        }

        result
    }

    fn record(&self, name: &str, outcome: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_command(name, outcome, started.elapsed().as_secs_f64());
        }
    }
}
