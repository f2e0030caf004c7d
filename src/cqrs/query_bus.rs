use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::event_sourcing::core::EsResult;
use crate::metrics::{Metrics, OUTCOME_FAILED, OUTCOME_OK, OUTCOME_REJECTED};
use super::registry::HandlerRegistry;

// ============================================================================
// Query Bus
// ============================================================================
//
// Same routing contract as the command bus, but handlers read projected
// read models and return a typed result. Read models are eventually
// consistent with the write side.
//
// ============================================================================

/// A self-validating read request.
pub trait Query: Send + 'static {
    const NAME: &'static str;

    type Output: Send + 'static;

    fn validate(&self) -> EsResult<()>;

    fn query_name(&self) -> &'static str {
        Self::NAME
    }
}

#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, query: Q) -> EsResult<Q::Output>;
}

pub struct QueryBus {
    handlers: HandlerRegistry,
    metrics: Option<Arc<Metrics>>,
}

impl Default for QueryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBus {
    pub fn new() -> Self {
        Self {
            handlers: HandlerRegistry::new("query"),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn register_handler<Q, H>(&mut self, handler: H) -> EsResult<()>
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        let handler: Arc<dyn QueryHandler<Q>> = Arc::new(handler);
        self.handlers.insert(Q::NAME, handler)
    }

    pub fn require<Q: Query>(&self) -> EsResult<()> {
        self.handlers.get::<Arc<dyn QueryHandler<Q>>>(Q::NAME).map(|_| ())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains(name)
    }

    pub fn registered_queries(&self) -> Vec<&'static str> {
        self.handlers.names()
    }

    pub async fn dispatch<Q: Query>(&self, query: Q) -> EsResult<Q::Output> {
        let started = Instant::now();
        let handler = Arc::clone(self.handlers.get::<Arc<dyn QueryHandler<Q>>>(query.query_name())?);

        if let Err(err) = query.validate() {
            tracing::debug!(query = Q::NAME, error = %err, "Query rejected by validation");
            self.record(Q::NAME, OUTCOME_REJECTED, started);
            return Err(err);
        }

        let result = handler.handle(query).await;
        match &result {
            Ok(_) => self.record(Q::NAME, OUTCOME_OK, started),
            Err(err) => {
                tracing::warn!(query = Q::NAME, error = %err, "Query failed");
                self.record(Q::NAME, OUTCOME_FAILED, started);
            }
        }

        result
    }

    fn record(&self, name: &str, outcome: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_query(name, outcome, started.elapsed().as_secs_f64());
        }
    }
}
