use std::sync::Arc;

use crate::event_sourcing::core::{Aggregate, EsError, EsResult, EventEnvelope};
use crate::metrics::Metrics;
use super::event_store::EventStore;

// ============================================================================
// Aggregate Repository
// ============================================================================
//
// Orchestrates: Event Store → replay → Aggregate, and
//               Aggregate → uncommitted events → Event Store
//
// Conflicts are returned to the caller, never retried here: only the
// command handler knows which business rules must be checked again
// against fresh state.
//
// ============================================================================

#[derive(Clone)]
pub struct AggregateRepository {
    store: Arc<dyn EventStore>,
    metrics: Option<Arc<Metrics>>,
}

impl AggregateRepository {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Fetch and replay an aggregate's full history.
    ///
    /// A replay failure yields an error and never a partially hydrated
    /// aggregate.
    pub async fn load<A: Aggregate>(&self, aggregate_id: &str) -> EsResult<A> {
        let events = self.store.get_events(A::AGGREGATE_TYPE, aggregate_id).await?;

        if events.is_empty() {
            return Err(EsError::AggregateNotFound {
                aggregate_type: A::AGGREGATE_TYPE.to_string(),
                aggregate_id: aggregate_id.to_string(),
            });
        }

        let mut aggregate = A::new(aggregate_id);
        aggregate.load_from_history(&events).map_err(|err| {
            tracing::error!(
                aggregate_id = %aggregate_id,
                aggregate_type = A::AGGREGATE_TYPE,
                error = %err,
                "Replay failed"
            );
            err
        })?;

        tracing::debug!(
            aggregate_id = %aggregate_id,
            aggregate_type = A::AGGREGATE_TYPE,
            version = aggregate.version(),
            "Loaded aggregate"
        );

        Ok(aggregate)
    }

    /// Append the aggregate's uncommitted events under optimistic
    /// concurrency and return what was committed.
    pub async fn save<A: Aggregate>(&self, aggregate: &mut A) -> EsResult<Vec<EventEnvelope>> {
        let uncommitted = aggregate.uncommitted_events();
        if uncommitted.is_empty() {
            return Ok(Vec::new());
        }

        let expected_version = aggregate.base().persisted_version();
        let event_count = uncommitted.len();

        let result = self
            .store
            .save_events(aggregate.aggregate_id(), expected_version, uncommitted)
            .await;

        if let Err(err) = result {
            if err.is_conflict() {
                if let Some(metrics) = &self.metrics {
                    metrics.record_conflict(A::AGGREGATE_TYPE);
                }
            }
            return Err(err);
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_events_appended(A::AGGREGATE_TYPE, event_count);
        }

        tracing::info!(
            aggregate_id = %aggregate.aggregate_id(),
            aggregate_type = A::AGGREGATE_TYPE,
            new_version = aggregate.version(),
            event_count,
            "Saved aggregate"
        );

        Ok(aggregate.base_mut().mark_events_as_committed())
    }

    pub async fn exists(&self, aggregate_type: &str, aggregate_id: &str) -> EsResult<bool> {
        let version = self
            .store
            .get_aggregate_version(aggregate_type, aggregate_id)
            .await?;
        Ok(version >= 0)
    }
}
