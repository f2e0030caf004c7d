use async_trait::async_trait;

use crate::event_sourcing::core::{EsResult, EventEnvelope};

/// Derives and persists one read model from the event stream.
///
/// `project_event` must have upsert semantics: the same envelope may be
/// delivered again during a rebuild.
#[async_trait]
pub trait Projector: Send + Sync {
    fn projector_name(&self) -> &str;

    /// Event types this projector consumes (e.g. `["user.created"]`).
    fn event_types(&self) -> &[&'static str];

    async fn project_event(&self, envelope: &EventEnvelope) -> EsResult<()>;

    /// Drop rows derived from `aggregate_type` before a rebuild replays
    /// them.
    async fn reset(&self, _aggregate_type: &str) -> EsResult<()> {
        Ok(())
    }

    fn handles(&self, event_type: &str) -> bool {
        self.event_types().iter().any(|t| *t == event_type)
    }
}
