// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// Envelope, aggregate base behavior and error taxonomy. Nothing in here
// knows about a concrete aggregate (no User, Webhook, Character, etc.).
//
// ============================================================================

pub mod aggregate;
pub mod error;
pub mod event;

// Re-export core types for convenience
pub use aggregate::{Aggregate, AggregateBase, NO_EVENTS_VERSION};
pub use error::{EsError, EsResult, ProjectionFailure};
pub use event::{
    deserialize_event, serialize_event, unknown_event_type, DomainEvent, EventEnvelope,
    CAUSATION_ID_KEY, CORRELATION_ID_KEY, USER_ID_KEY,
};
