use uuid::Uuid;

// ============================================================================
// Engine Error Taxonomy
// ============================================================================
//
// Every fallible engine operation returns EsError. Business rule errors from
// a domain module are boxed into `Domain`; only `ConcurrencyConflict` is a
// retryable condition.
//
// ============================================================================

pub type EsResult<T> = Result<T, EsError>;

/// One projector's failure to apply one event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionFailure {
    pub projector: String,
    pub event_id: Uuid,
    pub event_type: String,
    pub message: String,
}

impl std::fmt::Display for ProjectionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed on {} ({}): {}",
            self.projector, self.event_type, self.event_id, self.message
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EsError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no handler registered for {0}")]
    HandlerNotFound(String),

    #[error("a handler is already registered for {0}")]
    DuplicateHandler(String),

    #[error("aggregate not found: {aggregate_type}/{aggregate_id}")]
    AggregateNotFound {
        aggregate_type: String,
        aggregate_id: String,
    },

    #[error(
        "concurrency conflict on {aggregate_id}: expected version {expected}, but current is {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: String,
        expected: i64,
        actual: i64,
    },

    #[error("unknown event type {event_type} for aggregate type {aggregate_type}")]
    UnknownEventType {
        aggregate_type: String,
        event_type: String,
    },

    #[error("{} projection failure(s): {}", .0.len(), join_failures(.0))]
    Projection(Vec<ProjectionFailure>),

    #[error("event payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event store failure: {0}")]
    Store(#[from] sqlx::Error),

    #[error("business rule violated: {0}")]
    Domain(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EsError {
    pub fn validation(message: impl Into<String>) -> Self {
        EsError::Validation(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EsError::ConcurrencyConflict { .. })
    }
}

fn join_failures(failures: &[ProjectionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
