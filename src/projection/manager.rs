use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::event_sourcing::core::{EsError, EsResult, EventEnvelope, ProjectionFailure};
use crate::event_sourcing::store::EventStore;
use crate::metrics::Metrics;
use super::projector::Projector;

// ============================================================================
// Projector Manager
// ============================================================================
//
// Fans committed envelopes out to every projector that declared the event
// type. One projector failing never stops the others; failures are
// collected and returned together. The write side is already durable, so a
// projection error never unwinds it. Recovery is a rebuild.
//
// ============================================================================

pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Outcome of a full rebuild.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RebuildReport {
    /// Envelopes read from the global stream.
    pub events_scanned: usize,
    /// Envelopes of the rebuilt aggregate type delivered to at least one
    /// projector.
    pub events_projected: usize,
    pub failures: Vec<ProjectionFailure>,
}

impl RebuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ProjectorManager {
    store: Arc<dyn EventStore>,
    projectors: Vec<Arc<dyn Projector>>,
    page_size: usize,
    metrics: Option<Arc<Metrics>>,
}

impl ProjectorManager {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            projectors: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            metrics: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn register_projector(&mut self, projector: Arc<dyn Projector>) -> EsResult<()> {
        let name = projector.projector_name();
        if self.projectors.iter().any(|p| p.projector_name() == name) {
            return Err(EsError::DuplicateHandler(format!("projector {name}")));
        }

        tracing::info!(
            projector = %name,
            event_types = ?projector.event_types(),
            "Registered projector"
        );
        self.projectors.push(projector);
        Ok(())
    }

    pub fn projector_names(&self) -> Vec<&str> {
        self.projectors.iter().map(|p| p.projector_name()).collect()
    }

    /// Deliver one envelope to every interested projector.
    pub async fn project_event(&self, envelope: &EventEnvelope) -> EsResult<()> {
        let mut failures = Vec::new();
        self.deliver(envelope, &mut failures).await;
        into_result(failures)
    }

    /// Deliver a batch (e.g. what `AggregateRepository::save` returned) in
    /// order, collecting failures across the whole batch.
    pub async fn project_events(&self, envelopes: &[EventEnvelope]) -> EsResult<()> {
        let mut failures = Vec::new();
        for envelope in envelopes {
            self.deliver(envelope, &mut failures).await;
        }
        into_result(failures)
    }

    /// Reset every projector for `aggregate_type`, then replay the global
    /// stream from the beginning, delivering only that aggregate type.
    pub async fn rebuild_projections(&self, aggregate_type: &str) -> EsResult<RebuildReport> {
        tracing::info!(aggregate_type = %aggregate_type, "Rebuilding projections");

        for projector in &self.projectors {
            projector.reset(aggregate_type).await?;
        }

        let mut report = RebuildReport::default();
        let mut since = None;
        // ids already seen at the `since` timestamp; the stream is inclusive of it
        let mut boundary: HashSet<Uuid> = HashSet::new();
        let mut limit = self.page_size;

        loop {
            let page = self.store.get_event_stream(since, limit).await?;
            let full_page = page.len() == limit;

            let fresh: Vec<EventEnvelope> = page
                .into_iter()
                .filter(|e| !boundary.contains(&e.event_id))
                .collect();

            let Some(last) = fresh.last() else {
                if full_page {
                    // Every row shares the boundary timestamp; widen the page
                    limit = limit.saturating_mul(2);
                    continue;
                }
                break;
            };
            let last_timestamp = last.timestamp;

            for envelope in &fresh {
                report.events_scanned += 1;
                if envelope.aggregate_type != aggregate_type {
                    continue;
                }
                if self.deliver(envelope, &mut report.failures).await {
                    report.events_projected += 1;
                }
            }

            if since != Some(last_timestamp) {
                boundary.clear();
                since = Some(last_timestamp);
            }
            boundary.extend(
                fresh
                    .iter()
                    .filter(|e| e.timestamp == last_timestamp)
                    .map(|e| e.event_id),
            );
            limit = self.page_size;

            if !full_page {
                break;
            }
        }

        tracing::info!(
            aggregate_type = %aggregate_type,
            events_scanned = report.events_scanned,
            events_projected = report.events_projected,
            failures = report.failures.len(),
            "Rebuild complete"
        );

        Ok(report)
    }

    /// Returns whether any projector was interested.
    async fn deliver(&self, envelope: &EventEnvelope, failures: &mut Vec<ProjectionFailure>) -> bool {
        let mut delivered = false;

        for projector in self.projectors.iter().filter(|p| p.handles(&envelope.event_type)) {
            delivered = true;
            if let Err(err) = projector.project_event(envelope).await {
                tracing::error!(
                    projector = %projector.projector_name(),
                    event_id = %envelope.event_id,
                    event_type = %envelope.event_type,
                    aggregate_id = %envelope.aggregate_id,
                    error = %err,
                    "Projection failed"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_projection_failure(projector.projector_name());
                }
                failures.push(ProjectionFailure {
                    projector: projector.projector_name().to_string(),
                    event_id: envelope.event_id,
                    event_type: envelope.event_type.clone(),
                    message: err.to_string(),
                });
            }
        }

        delivered
    }
}

fn into_result(failures: Vec<ProjectionFailure>) -> EsResult<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(EsError::Projection(failures))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::store::InMemoryEventStore;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    struct Recorder {
        name: &'static str,
        types: Vec<&'static str>,
        fail_on: Option<&'static str>,
        seen: Mutex<Vec<String>>,
        resets: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(name: &'static str, types: Vec<&'static str>) -> Self {
            Self {
                name,
                types,
                fail_on: None,
                seen: Mutex::new(Vec::new()),
                resets: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(mut self, event_type: &'static str) -> Self {
            self.fail_on = Some(event_type);
            self
        }
    }

    #[async_trait]
    impl Projector for Recorder {
        fn projector_name(&self) -> &str {
            self.name
        }

        fn event_types(&self) -> &[&'static str] {
            &self.types
        }

        async fn project_event(&self, envelope: &EventEnvelope) -> EsResult<()> {
            if self.fail_on == Some(envelope.event_type.as_str()) {
                return Err(EsError::validation("read model rejected event"));
            }
            self.seen
                .lock()
                .await
                .push(format!("{}@{}", envelope.aggregate_id, envelope.version));
            Ok(())
        }

        async fn reset(&self, aggregate_type: &str) -> EsResult<()> {
            self.seen.lock().await.clear();
            self.resets.lock().await.push(aggregate_type.to_string());
            Ok(())
        }
    }

    fn envelope(aggregate_type: &str, id: &str, version: i64, event_type: &str) -> EventEnvelope {
        EventEnvelope::new(id, aggregate_type, version, event_type, json!({}))
    }

    #[tokio::test]
    async fn test_routes_by_event_type() {
        let store = Arc::new(InMemoryEventStore::new());
        let users = Arc::new(Recorder::new("users", vec!["user.created"]));
        let hooks = Arc::new(Recorder::new("hooks", vec!["webhook.registered"]));

        let mut manager = ProjectorManager::new(store);
        manager.register_projector(users.clone()).unwrap();
        manager.register_projector(hooks.clone()).unwrap();

        manager
            .project_event(&envelope("user", "u-1", 0, "user.created"))
            .await
            .unwrap();

        assert_eq!(*users.seen.lock().await, vec!["u-1@0"]);
        assert!(hooks.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_projector_does_not_block_others() {
        let store = Arc::new(InMemoryEventStore::new());
        let broken = Arc::new(Recorder::new("broken", vec!["user.created"]).failing_on("user.created"));
        let healthy = Arc::new(Recorder::new("healthy", vec!["user.created"]));
        let metrics = Arc::new(Metrics::new().unwrap());

        let mut manager = ProjectorManager::new(store).with_metrics(metrics.clone());
        manager.register_projector(broken).unwrap();
        manager.register_projector(healthy.clone()).unwrap();

        let result = manager
            .project_event(&envelope("user", "u-1", 0, "user.created"))
            .await;

        match result {
            Err(EsError::Projection(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].projector, "broken");
            }
            other => panic!("expected projection error, got {other:?}"),
        }
        assert_eq!(*healthy.seen.lock().await, vec!["u-1@0"]);
        assert_eq!(
            metrics.projection_failures.with_label_values(&["broken"]).get(),
            1
        );
    }

    #[test]
    fn test_duplicate_projector_name() {
        let mut manager = ProjectorManager::new(Arc::new(InMemoryEventStore::new()));
        manager
            .register_projector(Arc::new(Recorder::new("users", vec![])))
            .unwrap();
        let result = manager.register_projector(Arc::new(Recorder::new("users", vec![])));
        assert!(matches!(result, Err(EsError::DuplicateHandler(_))));
        assert_eq!(manager.projector_names(), vec!["users"]);
    }

    #[tokio::test]
    async fn test_rebuild_replays_only_requested_aggregate_type() {
        let store = Arc::new(InMemoryEventStore::new());
        for id in ["u-1", "u-2", "u-3"] {
            store
                .save_events(
                    id,
                    -1,
                    &[
                        envelope("user", id, 0, "user.created"),
                        envelope("user", id, 1, "user.renamed"),
                    ],
                )
                .await
                .unwrap();
        }
        store
            .save_events("w-1", -1, &[envelope("webhook", "w-1", 0, "webhook.registered")])
            .await
            .unwrap();

        let users = Arc::new(Recorder::new("users", vec!["user.created", "user.renamed"]));
        let mut manager = ProjectorManager::new(store).with_page_size(2);
        manager.register_projector(users.clone()).unwrap();

        // Stale rows from before the rebuild must be dropped by reset
        users.seen.lock().await.push("stale".to_string());

        let report = manager.rebuild_projections("user").await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.events_scanned, 7);
        assert_eq!(report.events_projected, 6);
        assert_eq!(*users.resets.lock().await, vec!["user"]);

        let mut seen = users.seen.lock().await.clone();
        seen.sort();
        assert_eq!(seen, vec!["u-1@0", "u-1@1", "u-2@0", "u-2@1", "u-3@0", "u-3@1"]);
    }

    #[tokio::test]
    async fn test_rebuild_handles_shared_timestamps_across_pages() {
        let store = Arc::new(InMemoryEventStore::new());
        let mut batch = Vec::new();
        for version in 0..5 {
            batch.push(envelope("user", "u-1", version, "user.renamed"));
        }
        let shared = batch[0].timestamp;
        for e in &mut batch {
            e.timestamp = shared;
        }
        store.save_events("u-1", -1, &batch).await.unwrap();

        let users = Arc::new(Recorder::new("users", vec!["user.renamed"]));
        let mut manager = ProjectorManager::new(store).with_page_size(2);
        manager.register_projector(users.clone()).unwrap();

        let report = manager.rebuild_projections("user").await.unwrap();
        assert_eq!(report.events_scanned, 5);
        assert_eq!(report.events_projected, 5);
        assert_eq!(users.seen.lock().await.len(), 5);
    }
}
