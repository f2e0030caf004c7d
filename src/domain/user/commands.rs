use uuid::Uuid;

use crate::cqrs::Command;
use crate::event_sourcing::core::{EsError, EsResult};
use super::value_objects::{Email, MAX_DISPLAY_NAME_LEN};

// ============================================================================
// User Domain Commands
// ============================================================================
//
// `validate` only checks shape. Rules that depend on current state
// (already exists, not active, ...) live in the aggregate.
//
// ============================================================================

fn require_id(user_id: &str) -> EsResult<()> {
    if user_id.trim().is_empty() {
        return Err(EsError::validation("user_id is required"));
    }
    Ok(())
}

fn require_email(email: &Email) -> EsResult<()> {
    if !email.is_well_formed() {
        return Err(EsError::validation(format!("invalid email address: {email}")));
    }
    Ok(())
}

fn require_display_name(display_name: &str) -> EsResult<()> {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return Err(EsError::validation("display_name is required"));
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(EsError::validation(format!(
            "display_name exceeds {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub user_id: String,
    pub email: Email,
    pub display_name: String,
}

impl CreateUser {
    /// Allocates the new user's id up front so the caller knows it once
    /// dispatch succeeds.
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::now_v7().to_string(),
            email: Email::new(email),
            display_name: display_name.into(),
        }
    }

    pub fn with_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }
}

impl Command for CreateUser {
    const NAME: &'static str = "user.create";

    fn aggregate_id(&self) -> &str {
        &self.user_id
    }

    fn validate(&self) -> EsResult<()> {
        require_id(&self.user_id)?;
        require_email(&self.email)?;
        require_display_name(&self.display_name)
    }
}

#[derive(Debug, Clone)]
pub struct ChangeUserEmail {
    pub user_id: String,
    pub new_email: Email,
}

impl Command for ChangeUserEmail {
    const NAME: &'static str = "user.change_email";

    fn aggregate_id(&self) -> &str {
        &self.user_id
    }

    fn validate(&self) -> EsResult<()> {
        require_id(&self.user_id)?;
        require_email(&self.new_email)
    }
}

#[derive(Debug, Clone)]
pub struct RenameUser {
    pub user_id: String,
    pub display_name: String,
}

impl Command for RenameUser {
    const NAME: &'static str = "user.rename";

    fn aggregate_id(&self) -> &str {
        &self.user_id
    }

    fn validate(&self) -> EsResult<()> {
        require_id(&self.user_id)?;
        require_display_name(&self.display_name)
    }
}

#[derive(Debug, Clone)]
pub struct DeactivateUser {
    pub user_id: String,
    pub reason: String,
}

impl Command for DeactivateUser {
    const NAME: &'static str = "user.deactivate";

    fn aggregate_id(&self) -> &str {
        &self.user_id
    }

    fn validate(&self) -> EsResult<()> {
        require_id(&self.user_id)?;
        if self.reason.trim().is_empty() {
            return Err(EsError::validation("reason is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ReactivateUser {
    pub user_id: String,
    pub notes: Option<String>,
}

impl Command for ReactivateUser {
    const NAME: &'static str = "user.reactivate";

    fn aggregate_id(&self) -> &str {
        &self.user_id
    }

    fn validate(&self) -> EsResult<()> {
        require_id(&self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_allocates_id() {
        let a = CreateUser::new("ada@example.com", "Ada");
        let b = CreateUser::new("ada@example.com", "Ada");
        assert!(!a.user_id.is_empty());
        assert_ne!(a.user_id, b.user_id);
        assert!(a.validate().is_ok());
        assert_eq!(a.command_name(), "user.create");
    }

    #[test]
    fn test_create_user_validation() {
        let bad_email = CreateUser::new("invalid-email", "Ada");
        assert!(matches!(bad_email.validate(), Err(EsError::Validation(_))));

        let blank_name = CreateUser::new("ada@example.com", "  ");
        assert!(matches!(blank_name.validate(), Err(EsError::Validation(_))));

        let long_name = CreateUser::new("ada@example.com", "x".repeat(MAX_DISPLAY_NAME_LEN + 1));
        assert!(matches!(long_name.validate(), Err(EsError::Validation(_))));

        let no_id = CreateUser::new("ada@example.com", "Ada").with_id("");
        assert!(matches!(no_id.validate(), Err(EsError::Validation(_))));
    }

    #[test]
    fn test_other_commands_validate_shape() {
        let change = ChangeUserEmail { user_id: "u-1".into(), new_email: Email::new("nope") };
        assert!(change.validate().is_err());

        let deactivate = DeactivateUser { user_id: "u-1".into(), reason: String::new() };
        assert!(deactivate.validate().is_err());

        let reactivate = ReactivateUser { user_id: "u-1".into(), notes: None };
        assert!(reactivate.validate().is_ok());

        let rename = RenameUser { user_id: "u-1".into(), display_name: "Ada L".into() };
        assert!(rename.validate().is_ok());
    }
}
