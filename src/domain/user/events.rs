use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event_sourcing::core::{
    deserialize_event, serialize_event, unknown_event_type, DomainEvent, EsResult,
};
use super::value_objects::Email;

// ============================================================================
// User Domain Events
// ============================================================================

pub const USER_CREATED: &str = "user.created";
pub const USER_EMAIL_CHANGED: &str = "user.email_changed";
pub const USER_RENAMED: &str = "user.renamed";
pub const USER_DEACTIVATED: &str = "user.deactivated";
pub const USER_REACTIVATED: &str = "user.reactivated";

pub const ALL_USER_EVENTS: &[&str] = &[
    USER_CREATED,
    USER_EMAIL_CHANGED,
    USER_RENAMED,
    USER_DEACTIVATED,
    USER_REACTIVATED,
];

/// Union type for all user events
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    Created(UserCreated),
    EmailChanged(UserEmailChanged),
    Renamed(UserRenamed),
    Deactivated(UserDeactivated),
    Reactivated(UserReactivated),
}

impl DomainEvent for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => USER_CREATED,
            UserEvent::EmailChanged(_) => USER_EMAIL_CHANGED,
            UserEvent::Renamed(_) => USER_RENAMED,
            UserEvent::Deactivated(_) => USER_DEACTIVATED,
            UserEvent::Reactivated(_) => USER_REACTIVATED,
        }
    }

    fn to_data(&self) -> EsResult<Value> {
        match self {
            UserEvent::Created(e) => serialize_event(e),
            UserEvent::EmailChanged(e) => serialize_event(e),
            UserEvent::Renamed(e) => serialize_event(e),
            UserEvent::Deactivated(e) => serialize_event(e),
            UserEvent::Reactivated(e) => serialize_event(e),
        }
    }

    fn from_stored(aggregate_type: &str, event_type: &str, data: &Value) -> EsResult<Self> {
        match event_type {
            USER_CREATED => Ok(UserEvent::Created(deserialize_event(data)?)),
            USER_EMAIL_CHANGED => Ok(UserEvent::EmailChanged(deserialize_event(data)?)),
            USER_RENAMED => Ok(UserEvent::Renamed(deserialize_event(data)?)),
            USER_DEACTIVATED => Ok(UserEvent::Deactivated(deserialize_event(data)?)),
            USER_REACTIVATED => Ok(UserEvent::Reactivated(deserialize_event(data)?)),
            other => Err(unknown_event_type(aggregate_type, other)),
        }
    }
}

// Individual event types

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    pub email: Email,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEmailChanged {
    pub old_email: Email,
    pub new_email: Email,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRenamed {
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDeactivated {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReactivated {
    pub notes: Option<String>,
}
