//! Embeddable event-sourcing and CQRS engine.
//!
//! Every state change of an aggregate is persisted as an immutable,
//! versioned [`EventEnvelope`]; current state is rebuilt by replaying those
//! envelopes. Writes go through the [`CommandBus`] and the
//! [`AggregateRepository`] under optimistic concurrency, reads go through
//! the [`QueryBus`] against read models kept up to date by the
//! [`ProjectorManager`].

pub mod config;
pub mod cqrs;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
pub mod projection;
pub mod utils;

pub use config::EngineConfig;
pub use cqrs::{Command, CommandBus, CommandHandler, Query, QueryBus, QueryHandler};
pub use event_sourcing::core::{
    Aggregate, AggregateBase, DomainEvent, EsError, EsResult, EventEnvelope, ProjectionFailure,
};
pub use event_sourcing::store::{
    AggregateRepository, EventStore, InMemoryEventStore, PostgresEventStore,
};
pub use metrics::Metrics;
pub use projection::{Projector, ProjectorManager, RebuildReport};
