use crate::event_sourcing::core::EsError;
use super::value_objects::UserStatus;

// ============================================================================
// User Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("User is already deactivated")]
    AlreadyDeactivated,

    #[error("User must be active to perform this operation")]
    NotActive,

    #[error("User must be deactivated to reactivate")]
    NotDeactivated,

    #[error("Invalid user status: {0:?}")]
    InvalidStatus(UserStatus),

    #[error("Aggregate not initialized")]
    NotInitialized,
}

impl From<UserError> for EsError {
    fn from(err: UserError) -> Self {
        EsError::Domain(Box::new(err))
    }
}
