use serde::{Deserialize, Serialize};

// ============================================================================
// User Value Objects
// ============================================================================

pub const MAX_DISPLAY_NAME_LEN: usize = 100;

/// User email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(pub String);

impl Email {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Basic structural check: one `@` with a non-empty local part and a
    /// dotted domain.
    pub fn is_well_formed(&self) -> bool {
        let mut parts = self.0.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !self.0.chars().any(char::is_whitespace)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// User status in the system
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    /// No `user.created` event applied yet
    #[default]
    Unregistered,
    Active,
    Deactivated,
}
