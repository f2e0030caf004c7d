// ============================================================================
// Projections - Read Models Derived from the Event Stream
// ============================================================================

pub mod manager;
pub mod projector;

pub use manager::{ProjectorManager, RebuildReport};
pub use projector::Projector;
