use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::event_sourcing::core::{EsError, EsResult, EventEnvelope, NO_EVENTS_VERSION};
use super::event_store::{validate_batch, EventStore};

// ============================================================================
// In-Memory Event Store
// ============================================================================
//
// Full implementation of the EventStore contract backed by a map of
// per-aggregate histories. The write lock is held for the whole
// check-and-append so the version check and the insert are one step.
//
// ============================================================================

#[derive(Default)]
struct MemoryLog {
    streams: HashMap<String, Vec<EventEnvelope>>,
    total: usize,
}

#[derive(Default)]
pub struct InMemoryEventStore {
    log: RwLock<MemoryLog>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of envelopes persisted across all aggregates.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.total
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save_events(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: &[EventEnvelope],
    ) -> EsResult<()> {
        validate_batch(aggregate_id, expected_version, events)?;

        let mut log = self.log.write().await;
        let current_version = log
            .streams
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map_or(NO_EVENTS_VERSION, |e| e.version);
        if current_version != expected_version {
            tracing::warn!(
                aggregate_id = %aggregate_id,
                expected_version,
                current_version,
                "Concurrency conflict on append"
            );
            return Err(EsError::ConcurrencyConflict {
                aggregate_id: aggregate_id.to_string(),
                expected: expected_version,
                actual: current_version,
            });
        }

        log.streams
            .entry(aggregate_id.to_string())
            .or_default()
            .extend_from_slice(events);
        log.total += events.len();

        tracing::debug!(
            aggregate_id = %aggregate_id,
            new_version = expected_version + events.len() as i64,
            event_count = events.len(),
            "Appended events to in-memory store"
        );

        Ok(())
    }

    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> EsResult<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .streams
            .get(aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| e.aggregate_type == aggregate_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_aggregate_version(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> EsResult<i64> {
        let log = self.log.read().await;
        Ok(log
            .streams
            .get(aggregate_id)
            .and_then(|stream| {
                stream
                    .iter()
                    .rev()
                    .find(|e| e.aggregate_type == aggregate_type)
                    .map(|e| e.version)
            })
            .unwrap_or(NO_EVENTS_VERSION))
    }

    async fn get_event_stream(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> EsResult<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        let mut page: Vec<&EventEnvelope> = log
            .streams
            .values()
            .flatten()
            .filter(|e| since.map_or(true, |since| e.timestamp >= since))
            .collect();

        page.sort_by(|a, b| (a.timestamp, a.event_id).cmp(&(b.timestamp, b.event_id)));
        Ok(page.into_iter().take(limit).cloned().collect())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(aggregate_id: &str, version: i64, event_type: &str) -> EventEnvelope {
        EventEnvelope::new(aggregate_id, "user", version, event_type, json!({}))
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let store = InMemoryEventStore::new();
        let batch = vec![
            envelope("u-1", 0, "user.created"),
            envelope("u-1", 1, "user.email_changed"),
        ];

        store.save_events("u-1", -1, &batch).await.unwrap();

        let events = store.get_events("user", "u-1").await.unwrap();
        assert_eq!(events, batch);
        assert_eq!(store.get_aggregate_version("user", "u-1").await.unwrap(), 1);
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_aggregate_is_empty() {
        let store = InMemoryEventStore::new();
        assert!(store.get_events("user", "missing").await.unwrap().is_empty());
        assert_eq!(store.get_aggregate_version("user", "missing").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_reused_version_conflicts_and_leaves_store_unchanged() {
        let store = InMemoryEventStore::new();
        store
            .save_events("u-1", -1, &[envelope("u-1", 0, "user.created")])
            .await
            .unwrap();

        let result = store
            .save_events("u-1", -1, &[envelope("u-1", 0, "user.created")])
            .await;

        assert!(matches!(
            result,
            Err(EsError::ConcurrencyConflict { expected: -1, actual: 0, .. })
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_rejected_first_save_leaves_no_stream() {
        let store = InMemoryEventStore::new();

        let result = store
            .save_events("u-7", 2, &[envelope("u-7", 3, "user.renamed")])
            .await;

        assert!(matches!(
            result,
            Err(EsError::ConcurrencyConflict { expected: 2, actual: -1, .. })
        ));
        assert!(store.log.read().await.streams.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_batch_is_not_persisted() {
        let store = InMemoryEventStore::new();
        let batch = vec![envelope("u-1", 0, "user.created"), envelope("u-1", 2, "user.renamed")];

        let result = store.save_events("u-1", -1, &batch).await;
        assert!(matches!(result, Err(EsError::Validation(_))));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_stream_is_time_ordered_and_paged() {
        let store = InMemoryEventStore::new();
        let first = envelope("u-1", 0, "user.created");
        let second = envelope("u-2", 0, "user.created");
        let third = envelope("u-1", 1, "user.renamed");

        store.save_events("u-2", -1, &[second.clone()]).await.unwrap();
        store.save_events("u-1", -1, &[first.clone(), third.clone()]).await.unwrap();

        let all = store.get_event_stream(None, 10).await.unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![first.event_id, second.event_id, third.event_id]);

        let page = store.get_event_stream(None, 2).await.unwrap();
        assert_eq!(page.len(), 2);

        let tail = store.get_event_stream(Some(third.timestamp), 10).await.unwrap();
        assert_eq!(tail.last().map(|e| e.event_id), Some(third.event_id));
    }
}
