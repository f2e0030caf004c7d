use crate::event_sourcing::core::{Aggregate, AggregateBase, EsResult};
use super::value_objects::{Email, UserStatus};
use super::events::*;
use super::errors::UserError;

// ============================================================================
// User Aggregate - Business Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct UserAggregate {
    base: AggregateBase,
    pub email: Option<Email>,
    pub display_name: String,
    pub status: UserStatus,
    pub deactivation_reason: Option<String>,
}

impl UserAggregate {
    pub fn create(&mut self, email: Email, display_name: impl Into<String>) -> EsResult<()> {
        if self.status != UserStatus::Unregistered {
            return Err(UserError::AlreadyExists(self.aggregate_id().to_string()).into());
        }

        self.raise_event(UserEvent::Created(UserCreated {
            email,
            display_name: display_name.into(),
        }))
    }

    /// No event is raised when the address is unchanged.
    pub fn change_email(&mut self, new_email: Email) -> EsResult<()> {
        self.validate_active()?;

        let Some(old_email) = self.email.clone() else {
            return Err(UserError::NotInitialized.into());
        };
        if old_email == new_email {
            return Ok(());
        }

        self.raise_event(UserEvent::EmailChanged(UserEmailChanged { old_email, new_email }))
    }

    pub fn rename(&mut self, display_name: impl Into<String>) -> EsResult<()> {
        self.validate_active()?;

        let display_name = display_name.into();
        if self.display_name == display_name {
            return Ok(());
        }

        self.raise_event(UserEvent::Renamed(UserRenamed { display_name }))
    }

    pub fn deactivate(&mut self, reason: impl Into<String>) -> EsResult<()> {
        match self.status {
            UserStatus::Active => {}
            UserStatus::Deactivated => return Err(UserError::AlreadyDeactivated.into()),
            UserStatus::Unregistered => return Err(UserError::NotInitialized.into()),
        }

        self.raise_event(UserEvent::Deactivated(UserDeactivated { reason: reason.into() }))
    }

    pub fn reactivate(&mut self, notes: Option<String>) -> EsResult<()> {
        if self.status != UserStatus::Deactivated {
            return Err(UserError::NotDeactivated.into());
        }

        self.raise_event(UserEvent::Reactivated(UserReactivated { notes }))
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Validate user can be modified
    fn validate_active(&self) -> Result<(), UserError> {
        match self.status {
            UserStatus::Active => Ok(()),
            UserStatus::Unregistered => Err(UserError::NotInitialized),
            UserStatus::Deactivated => Err(UserError::NotActive),
        }
    }

    fn require_status(&self, expected: UserStatus) -> Result<(), UserError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(UserError::InvalidStatus(self.status))
        }
    }
}

impl Aggregate for UserAggregate {
    type Event = UserEvent;
    const AGGREGATE_TYPE: &'static str = "user";

    fn new(id: &str) -> Self {
        Self {
            base: AggregateBase::new(Self::AGGREGATE_TYPE, id),
            email: None,
            display_name: String::new(),
            status: UserStatus::Unregistered,
            deactivation_reason: None,
        }
    }

    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn apply(&mut self, event: &UserEvent) -> EsResult<()> {
        match event {
            UserEvent::Created(e) => {
                self.require_status(UserStatus::Unregistered)?;
                self.email = Some(e.email.clone());
                self.display_name = e.display_name.clone();
                self.status = UserStatus::Active;
            }
            UserEvent::EmailChanged(e) => {
                self.require_status(UserStatus::Active)?;
                self.email = Some(e.new_email.clone());
            }
            UserEvent::Renamed(e) => {
                self.require_status(UserStatus::Active)?;
                self.display_name = e.display_name.clone();
            }
            UserEvent::Deactivated(e) => {
                self.require_status(UserStatus::Active)?;
                self.status = UserStatus::Deactivated;
                self.deactivation_reason = Some(e.reason.clone());
            }
            UserEvent::Reactivated(_) => {
                self.require_status(UserStatus::Deactivated)?;
                self.status = UserStatus::Active;
                self.deactivation_reason = None;
            }
        }

        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
