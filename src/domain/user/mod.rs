// ============================================================================
// User Domain - Business Logic for the User Aggregate
// ============================================================================
//
// This module contains ALL User-specific code:
// - Value objects (Email, UserStatus)
// - Events (user.created, user.email_changed, ...)
// - Commands (CreateUser, ChangeUserEmail, ...) and their handler
// - Errors (UserError enum)
// - Aggregate (UserAggregate with business logic)
// - Read model (UserDirectory projector) and queries
//
// It only touches the engine through its public traits.
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;
pub mod read_model;
pub mod queries;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
pub use read_model::*;
pub use queries::*;

use std::sync::Arc;

use crate::cqrs::{CommandBus, QueryBus};
use crate::event_sourcing::core::EsResult;

/// Register every user command and query handler on the service's buses.
pub fn register_handlers(
    commands: &mut CommandBus,
    queries: &mut QueryBus,
    handler: UserCommandHandler,
    directory: Arc<UserDirectory>,
) -> EsResult<()> {
    commands.register_handler::<CreateUser, _>(handler.clone())?;
    commands.register_handler::<ChangeUserEmail, _>(handler.clone())?;
    commands.register_handler::<RenameUser, _>(handler.clone())?;
    commands.register_handler::<DeactivateUser, _>(handler.clone())?;
    commands.register_handler::<ReactivateUser, _>(handler)?;

    let query_handler = UserQueryHandler::new(directory);
    queries.register_handler::<GetUser, _>(query_handler.clone())?;
    queries.register_handler::<FindUserByEmail, _>(query_handler.clone())?;
    queries.register_handler::<ListActiveUsers, _>(query_handler)?;

    Ok(())
}
