use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::event_sourcing::core::{EsError, EsResult, EventEnvelope};

// ============================================================================
// Event Store Contract - Append-Only Persistence for Envelopes
// ============================================================================
//
// Responsibilities:
// 1. Append envelopes atomically (all-or-nothing)
// 2. Reject a batch whose expected version is stale (optimistic concurrency)
// 3. Load an aggregate's history in version order
// 4. Serve a globally time-ordered stream for projection rebuilds
//
// (aggregate_id, version) is unique across the whole store. That constraint
// is the only concurrency primitive; implementations never lock.
//
// ============================================================================

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `events` if the persisted version of `aggregate_id` equals
    /// `expected_version`. Fails with `ConcurrencyConflict` otherwise.
    async fn save_events(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: &[EventEnvelope],
    ) -> EsResult<()>;

    /// All envelopes of one aggregate, ascending by version. Empty means the
    /// aggregate does not exist.
    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> EsResult<Vec<EventEnvelope>>;

    /// Highest persisted version, or -1 when there are no events.
    async fn get_aggregate_version(&self, aggregate_type: &str, aggregate_id: &str)
        -> EsResult<i64>;

    /// Up to `limit` envelopes across all aggregates with
    /// `timestamp >= since`, ordered by `(timestamp, event_id)`.
    async fn get_event_stream(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> EsResult<Vec<EventEnvelope>>;
}

/// Structural checks every store runs before touching storage.
///
/// The batch must be non-empty, belong to one aggregate and carry
/// contiguous versions starting at `expected_version + 1`.
pub fn validate_batch(
    aggregate_id: &str,
    expected_version: i64,
    events: &[EventEnvelope],
) -> EsResult<()> {
    let Some(first) = events.first() else {
        return Err(EsError::validation("cannot append empty event list"));
    };

    let mut next = expected_version + 1;
    for envelope in events {
        if envelope.aggregate_id != aggregate_id {
            return Err(EsError::validation(format!(
                "event {} belongs to aggregate {}, not {}",
                envelope.event_id, envelope.aggregate_id, aggregate_id
            )));
        }
        if envelope.aggregate_type != first.aggregate_type {
            return Err(EsError::validation(format!(
                "mixed aggregate types in one batch: {} and {}",
                first.aggregate_type, envelope.aggregate_type
            )));
        }
        if envelope.version != next {
            return Err(EsError::validation(format!(
                "event {} has version {}, expected {}",
                envelope.event_id, envelope.version, next
            )));
        }
        next += 1;
    }

    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
