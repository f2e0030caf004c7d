// ============================================================================
// CQRS Dispatch - Command Bus and Query Bus
// ============================================================================
//
// Each service builds and owns its own buses at startup; there is no
// process-wide registry.
//
// ============================================================================

pub mod command_bus;
pub mod query_bus;
mod registry;

pub use command_bus::{Command, CommandBus, CommandHandler};
pub use query_bus::{Query, QueryBus, QueryHandler};
