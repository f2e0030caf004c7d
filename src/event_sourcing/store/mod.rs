// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// The EventStore contract, its in-memory and PostgreSQL implementations,
// and the aggregate repository built on top of it.
//
// ============================================================================

pub mod event_store;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use event_store::{validate_batch, EventStore};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use repository::AggregateRepository;
