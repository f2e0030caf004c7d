use super::error::{EsError, EsResult};
use super::event::{DomainEvent, EventEnvelope};

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (not stored directly)
// 2. Domain methods validate, then raise events
// 3. Raising applies the event locally before buffering it
// 4. Replay is a pure function of the persisted event sequence
// 5. Unknown event types halt replay
//
// ============================================================================

/// Version of an aggregate with no persisted events.
pub const NO_EVENTS_VERSION: i64 = -1;

/// Identity, version and uncommitted buffer shared by every aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateBase {
    id: String,
    aggregate_type: String,
    version: i64,
    uncommitted: Vec<EventEnvelope>,
}

impl AggregateBase {
    pub fn new(aggregate_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            aggregate_type: aggregate_type.into(),
            version: NO_EVENTS_VERSION,
            uncommitted: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn uncommitted_events(&self) -> &[EventEnvelope] {
        &self.uncommitted
    }

    /// Version the aggregate had before the current batch of raises.
    pub fn persisted_version(&self) -> i64 {
        self.version - self.uncommitted.len() as i64
    }

    /// Only the repository commits, after a successful save.
    pub(crate) fn mark_events_as_committed(&mut self) -> Vec<EventEnvelope> {
        std::mem::take(&mut self.uncommitted)
    }
}

/// Generic Aggregate trait - all event-sourced aggregates implement this
///
/// Implementors own an [`AggregateBase`] and a pure reducer `apply`. The
/// provided methods implement raising and replay on top of those two.
pub trait Aggregate: Sized + Send + Sync {
    type Event: DomainEvent;

    /// Namespaced type name persisted on every envelope (e.g. `"user"`).
    const AGGREGATE_TYPE: &'static str;

    /// Fresh, empty aggregate at version -1.
    fn new(id: &str) -> Self;

    fn base(&self) -> &AggregateBase;

    fn base_mut(&mut self) -> &mut AggregateBase;

    /// Reducer: must only touch derived state and never read anything
    /// outside `self` and `event`.
    fn apply(&mut self, event: &Self::Event) -> EsResult<()>;

    fn aggregate_id(&self) -> &str {
        self.base().id()
    }

    fn version(&self) -> i64 {
        self.base().version()
    }

    fn uncommitted_events(&self) -> &[EventEnvelope] {
        self.base().uncommitted_events()
    }

    /// Apply `event` immediately and buffer it at the next version.
    ///
    /// All-or-nothing: if the reducer fails the version is rolled back and
    /// nothing is buffered.
    fn raise_event(&mut self, event: Self::Event) -> EsResult<()> {
        let previous = self.version();
        let next = previous + 1;
        let data = event.to_data()?;

        let envelope = {
            let base = self.base_mut();
            base.version = next;
            EventEnvelope::new(
                base.id.clone(),
                base.aggregate_type.clone(),
                next,
                event.event_type(),
                data,
            )
        };

        if let Err(err) = self.apply(&event) {
            self.base_mut().version = previous;
            return Err(err);
        }

        tracing::debug!(
            aggregate_id = %envelope.aggregate_id,
            aggregate_type = %envelope.aggregate_type,
            event_type = %envelope.event_type,
            version = next,
            "Raised event"
        );

        self.base_mut().uncommitted.push(envelope);
        Ok(())
    }

    /// Replay persisted envelopes in ascending version order.
    fn load_from_history(&mut self, events: &[EventEnvelope]) -> EsResult<()> {
        for envelope in events {
            if envelope.aggregate_id != self.aggregate_id()
                || envelope.aggregate_type != Self::AGGREGATE_TYPE
            {
                return Err(EsError::validation(format!(
                    "event {} belongs to {}/{}, not {}/{}",
                    envelope.event_id,
                    envelope.aggregate_type,
                    envelope.aggregate_id,
                    Self::AGGREGATE_TYPE,
                    self.aggregate_id()
                )));
            }

            let expected = self.version() + 1;
            if envelope.version != expected {
                return Err(EsError::validation(format!(
                    "event {} has version {}, expected {}",
                    envelope.event_id, envelope.version, expected
                )));
            }

            let event = Self::Event::from_stored(
                &envelope.aggregate_type,
                &envelope.event_type,
                &envelope.data,
            )?;
            self.apply(&event)?;
            self.base_mut().version = envelope.version;
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::event::unknown_event_type;
    use serde_json::{json, Value};

    #[derive(Debug, Clone, PartialEq)]
    enum CounterEvent {
        Incremented(i64),
        Reset,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Incremented(_) => "counter.incremented",
                CounterEvent::Reset => "counter.reset",
            }
        }

        fn to_data(&self) -> EsResult<Value> {
            Ok(match self {
                CounterEvent::Incremented(by) => json!({ "by": by }),
                CounterEvent::Reset => json!({}),
            })
        }

        fn from_stored(aggregate_type: &str, event_type: &str, data: &Value) -> EsResult<Self> {
            match event_type {
                "counter.incremented" => Ok(CounterEvent::Incremented(
                    data["by"].as_i64().unwrap_or_default(),
                )),
                "counter.reset" => Ok(CounterEvent::Reset),
                other => Err(unknown_event_type(aggregate_type, other)),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        base: AggregateBase,
        total: i64,
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;
        const AGGREGATE_TYPE: &'static str = "counter";

        fn new(id: &str) -> Self {
            Self { base: AggregateBase::new(Self::AGGREGATE_TYPE, id), total: 0 }
        }

        fn base(&self) -> &AggregateBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut AggregateBase {
            &mut self.base
        }

        fn apply(&mut self, event: &CounterEvent) -> EsResult<()> {
            match event {
                CounterEvent::Incremented(by) if *by <= 0 => {
                    Err(EsError::validation("increment must be positive"))
                }
                CounterEvent::Incremented(by) => {
                    self.total += by;
                    Ok(())
                }
                CounterEvent::Reset => {
                    self.total = 0;
                    Ok(())
                }
            }
        }
    }

    #[test]
    fn test_new_aggregate_has_no_version() {
        let counter = Counter::new("c-1");
        assert_eq!(counter.version(), NO_EVENTS_VERSION);
        assert!(counter.uncommitted_events().is_empty());
    }

    #[test]
    fn test_raise_event_applies_and_buffers() {
        let mut counter = Counter::new("c-1");
        counter.raise_event(CounterEvent::Incremented(2)).unwrap();
        counter.raise_event(CounterEvent::Incremented(3)).unwrap();

        assert_eq!(counter.total, 5);
        assert_eq!(counter.version(), 1);

        let buffered = counter.uncommitted_events();
        assert_eq!(buffered.len(), 2);
        assert_eq!(buffered[0].version, 0);
        assert_eq!(buffered[1].version, 1);
        assert_eq!(buffered[1].event_type, "counter.incremented");
        assert_eq!(buffered[1].aggregate_type, "counter");
        assert_eq!(counter.base().persisted_version(), NO_EVENTS_VERSION);
    }

    #[test]
    fn test_failed_apply_rolls_back() {
        let mut counter = Counter::new("c-1");
        counter.raise_event(CounterEvent::Incremented(1)).unwrap();

        let result = counter.raise_event(CounterEvent::Incremented(-4));
        assert!(matches!(result, Err(EsError::Validation(_))));
        assert_eq!(counter.version(), 0);
        assert_eq!(counter.total, 1);
        assert_eq!(counter.uncommitted_events().len(), 1);
    }

    #[test]
    fn test_version_monotonicity_from_loaded_state() {
        let mut source = Counter::new("c-1");
        for _ in 0..4 {
            source.raise_event(CounterEvent::Incremented(1)).unwrap();
        }
        let history = source.base_mut().mark_events_as_committed();

        let mut counter = Counter::new("c-1");
        counter.load_from_history(&history).unwrap();
        let v0 = counter.version();

        for n in 1..=3 {
            counter.raise_event(CounterEvent::Incremented(1)).unwrap();
            assert_eq!(counter.version(), v0 + n);
            assert_eq!(counter.uncommitted_events().last().unwrap().version, v0 + n);
        }
    }

    #[test]
    fn test_replay_is_deterministic() {
        let mut source = Counter::new("c-1");
        source.raise_event(CounterEvent::Incremented(7)).unwrap();
        source.raise_event(CounterEvent::Reset).unwrap();
        source.raise_event(CounterEvent::Incremented(2)).unwrap();
        let history = source.base_mut().mark_events_as_committed();

        let mut first = Counter::new("c-1");
        first.load_from_history(&history).unwrap();
        let mut second = Counter::new("c-1");
        second.load_from_history(&history).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.total, 2);
        assert_eq!(first.version(), 2);
    }

    #[test]
    fn test_unknown_event_type_halts_replay() {
        let history = vec![
            EventEnvelope::new("c-1", "counter", 0, "counter.incremented", json!({ "by": 1 })),
            EventEnvelope::new("c-1", "counter", 1, "x.unregistered", json!({})),
            EventEnvelope::new("c-1", "counter", 2, "counter.incremented", json!({ "by": 1 })),
        ];

        let mut counter = Counter::new("c-1");
        let result = counter.load_from_history(&history);
        assert!(matches!(
            result,
            Err(EsError::UnknownEventType { ref event_type, .. }) if event_type == "x.unregistered"
        ));
    }

    #[test]
    fn test_replay_rejects_foreign_and_gapped_events() {
        let foreign = vec![EventEnvelope::new("c-2", "counter", 0, "counter.reset", json!({}))];
        assert!(matches!(
            Counter::new("c-1").load_from_history(&foreign),
            Err(EsError::Validation(_))
        ));

        let gapped = vec![
            EventEnvelope::new("c-1", "counter", 0, "counter.reset", json!({})),
            EventEnvelope::new("c-1", "counter", 2, "counter.reset", json!({})),
        ];
        assert!(matches!(
            Counter::new("c-1").load_from_history(&gapped),
            Err(EsError::Validation(_))
        ));
    }
}
