use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::error::{EsError, EsResult};

// ============================================================================
// Event Envelope - Immutable Unit of Persisted Fact
// ============================================================================
//
// The payload is kept as a JSON document so the store never needs to know
// the concrete event shape. Typed decoding is deferred to the aggregate or
// projector that recognises the event type.
//
// ============================================================================

pub const CORRELATION_ID_KEY: &str = "correlation_id";
pub const CAUSATION_ID_KEY: &str = "causation_id";
pub const USER_ID_KEY: &str = "user_id";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventEnvelope {
    // Event Identity
    pub event_id: Uuid,
    pub event_type: String,

    // Owning Aggregate
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub version: i64,

    // Timing (set once at creation)
    pub timestamp: DateTime<Utc>,

    // Event Payload
    pub data: Value,

    // Tracing / causation info
    pub metadata: HashMap<String, String>,
}

impl EventEnvelope {
    pub fn new(
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        version: i64,
        event_type: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            // v7 ids sort by creation time, which keeps the global stream order stable
            event_id: Uuid::now_v7(),
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            data,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata_map(mut self, metadata: &HashMap<String, String>) -> Self {
        self.metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn with_correlation(self, correlation_id: Uuid) -> Self {
        self.with_metadata(CORRELATION_ID_KEY, correlation_id.to_string())
    }

    pub fn with_causation(self, causation_id: Uuid) -> Self {
        self.with_metadata(CAUSATION_ID_KEY, causation_id.to_string())
    }

    pub fn with_user(self, user_id: impl Into<String>) -> Self {
        self.with_metadata(USER_ID_KEY, user_id)
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.metadata
            .get(CORRELATION_ID_KEY)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }

    pub fn causation_id(&self) -> Option<Uuid> {
        self.metadata
            .get(CAUSATION_ID_KEY)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }

    /// Decode the payload into the shape registered for this event type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> EsResult<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// Implemented by each aggregate's event enum.
///
/// `event_type` is the namespaced discriminant persisted with the envelope
/// (e.g. `"user.created"`). `from_stored` is the inverse: it must reject any
/// discriminant it does not know with [`EsError::UnknownEventType`].
pub trait DomainEvent: Sized + Send + Sync {
    fn event_type(&self) -> &'static str;

    fn to_data(&self) -> EsResult<Value>;

    fn from_stored(aggregate_type: &str, event_type: &str, data: &Value) -> EsResult<Self>;
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> EsResult<Value> {
    Ok(serde_json::to_value(event)?)
}

pub fn deserialize_event<E: for<'de> Deserialize<'de>>(data: &Value) -> EsResult<E> {
    Ok(serde_json::from_value(data.clone())?)
}

pub fn unknown_event_type(aggregate_type: &str, event_type: &str) -> EsError {
    EsError::UnknownEventType {
        aggregate_type: aggregate_type.to_string(),
        event_type: event_type.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
