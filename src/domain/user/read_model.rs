use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::event_sourcing::core::{Aggregate, DomainEvent, EsError, EsResult, EventEnvelope};
use crate::projection::Projector;
use super::aggregate::UserAggregate;
use super::events::{UserEvent, ALL_USER_EVENTS};
use super::value_objects::{Email, UserStatus};

// ============================================================================
// User Directory - Read Model
// ============================================================================
//
// Denormalized view of every user, keyed by user id. Owned exclusively by
// this projector; query handlers only read it. Each row remembers the last
// applied version so a redelivered envelope is a no-op, while one that skips
// a version fails and leaves the row for a rebuild to repair.
//
// ============================================================================

pub const USER_DIRECTORY: &str = "user_directory";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub user_id: String,
    pub email: Email,
    pub display_name: String,
    pub status: UserStatus,
    pub version: i64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Default)]
pub struct UserDirectory {
    views: RwLock<HashMap<String, UserView>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: &str) -> Option<UserView> {
        self.views.read().await.get(user_id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<UserView> {
        self.views
            .read()
            .await
            .values()
            .find(|view| view.email.as_str().eq_ignore_ascii_case(email))
            .cloned()
    }

    /// Active users ordered by display name, then id.
    pub async fn list_active(&self, limit: usize) -> Vec<UserView> {
        let views = self.views.read().await;
        let mut active: Vec<UserView> = views
            .values()
            .filter(|view| view.status == UserStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        active.truncate(limit);
        active
    }

    pub async fn len(&self) -> usize {
        self.views.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.views.read().await.is_empty()
    }
}

fn version_gap(view: &UserView, envelope: &EventEnvelope) -> EsError {
    EsError::Internal(anyhow::anyhow!(
        "{} row for {} is at v{} but received {} v{}",
        USER_DIRECTORY,
        envelope.aggregate_id,
        view.version,
        envelope.event_type,
        envelope.version
    ))
}

fn missing_row(envelope: &EventEnvelope) -> EsError {
    EsError::Internal(anyhow::anyhow!(
        "no {} row for {} while applying {} v{}",
        USER_DIRECTORY,
        envelope.aggregate_id,
        envelope.event_type,
        envelope.version
    ))
}

#[async_trait]
impl Projector for UserDirectory {
    fn projector_name(&self) -> &str {
        USER_DIRECTORY
    }

    fn event_types(&self) -> &[&'static str] {
        ALL_USER_EVENTS
    }

    async fn project_event(&self, envelope: &EventEnvelope) -> EsResult<()> {
        let event = UserEvent::from_stored(&envelope.aggregate_type, &envelope.event_type, &envelope.data)?;
        let mut views = self.views.write().await;

        if let UserEvent::Created(created) = &event {
            if views
                .get(&envelope.aggregate_id)
                .is_some_and(|view| view.version >= envelope.version)
            {
                return Ok(());
            }
            views.insert(
                envelope.aggregate_id.clone(),
                UserView {
                    user_id: envelope.aggregate_id.clone(),
                    email: created.email.clone(),
                    display_name: created.display_name.clone(),
                    status: UserStatus::Active,
                    version: envelope.version,
                    last_updated: envelope.timestamp,
                },
            );
            return Ok(());
        }

        let view = views
            .get_mut(&envelope.aggregate_id)
            .ok_or_else(|| missing_row(envelope))?;

        if view.version >= envelope.version {
            tracing::debug!(
                projector = USER_DIRECTORY,
                aggregate_id = %envelope.aggregate_id,
                version = envelope.version,
                "Skipping already applied event"
            );
            return Ok(());
        }
        // Applying over a gap would lose the missing event for good
        if envelope.version != view.version + 1 {
            return Err(version_gap(view, envelope));
        }

        match event {
            UserEvent::Created(_) => {}
            UserEvent::EmailChanged(e) => view.email = e.new_email,
            UserEvent::Renamed(e) => view.display_name = e.display_name,
            UserEvent::Deactivated(_) => view.status = UserStatus::Deactivated,
            UserEvent::Reactivated(_) => view.status = UserStatus::Active,
        }
        view.version = envelope.version;
        view.last_updated = envelope.timestamp;

        Ok(())
    }

    async fn reset(&self, aggregate_type: &str) -> EsResult<()> {
        if aggregate_type == UserAggregate::AGGREGATE_TYPE {
            let mut views = self.views.write().await;
            tracing::info!(projector = USER_DIRECTORY, rows = views.len(), "Resetting read model");
            views.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::events::*;
    use crate::event_sourcing::core::serialize_event;

    fn envelope(id: &str, version: i64, event: UserEvent) -> EventEnvelope {
        EventEnvelope::new(id, "user", version, event.event_type(), event.to_data().unwrap())
    }

    fn created(id: &str, email: &str, name: &str) -> EventEnvelope {
        envelope(
            id,
            0,
            UserEvent::Created(UserCreated {
                email: Email::new(email),
                display_name: name.to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn test_created_then_updated() {
        let directory = UserDirectory::new();
        directory.project_event(&created("u-1", "ada@example.com", "Ada")).await.unwrap();

        let renamed = envelope(
            "u-1",
            1,
            UserEvent::Renamed(UserRenamed { display_name: "Ada Lovelace".to_string() }),
        );
        directory.project_event(&renamed).await.unwrap();

        let view = directory.get("u-1").await.unwrap();
        assert_eq!(view.display_name, "Ada Lovelace");
        assert_eq!(view.version, 1);
        assert_eq!(view.last_updated, renamed.timestamp);
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let directory = UserDirectory::new();
        let create = created("u-1", "ada@example.com", "Ada");
        let deactivate = envelope(
            "u-1",
            1,
            UserEvent::Deactivated(UserDeactivated { reason: "spam".to_string() }),
        );

        for e in [&create, &deactivate, &create, &deactivate] {
            directory.project_event(e).await.unwrap();
        }

        let view = directory.get("u-1").await.unwrap();
        assert_eq!(view.status, UserStatus::Deactivated);
        assert_eq!(view.version, 1);
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn test_out_of_order_delivery_is_rejected() {
        let directory = UserDirectory::new();
        directory.project_event(&created("u-1", "ada@example.com", "Ada")).await.unwrap();

        let email_changed = envelope(
            "u-1",
            1,
            UserEvent::EmailChanged(UserEmailChanged {
                old_email: Email::new("ada@example.com"),
                new_email: Email::new("ada@lovelace.dev"),
            }),
        );
        let renamed = envelope(
            "u-1",
            2,
            UserEvent::Renamed(UserRenamed { display_name: "Ada Lovelace".to_string() }),
        );

        assert!(matches!(directory.project_event(&renamed).await, Err(EsError::Internal(_))));
        let view = directory.get("u-1").await.unwrap();
        assert_eq!(view.version, 0);
        assert_eq!(view.display_name, "Ada");

        directory.project_event(&email_changed).await.unwrap();
        directory.project_event(&renamed).await.unwrap();

        let view = directory.get("u-1").await.unwrap();
        assert_eq!(view.email.as_str(), "ada@lovelace.dev");
        assert_eq!(view.display_name, "Ada Lovelace");
        assert_eq!(view.version, 2);
    }

    #[tokio::test]
    async fn test_update_without_row_fails() {
        let directory = UserDirectory::new();
        let orphan = EventEnvelope::new(
            "u-9",
            "user",
            3,
            USER_RENAMED,
            serialize_event(&UserRenamed { display_name: "Ghost".to_string() }).unwrap(),
        );
        assert!(matches!(directory.project_event(&orphan).await, Err(EsError::Internal(_))));
    }

    #[tokio::test]
    async fn test_queries_and_reset() {
        let directory = UserDirectory::new();
        directory.project_event(&created("u-2", "grace@example.com", "Grace")).await.unwrap();
        directory.project_event(&created("u-1", "ada@example.com", "Ada")).await.unwrap();
        directory
            .project_event(&envelope(
                "u-2",
                1,
                UserEvent::Deactivated(UserDeactivated { reason: "left".to_string() }),
            ))
            .await
            .unwrap();

        let found = directory.find_by_email("ADA@example.com").await.unwrap();
        assert_eq!(found.user_id, "u-1");

        let active: Vec<_> = directory.list_active(10).await.into_iter().map(|v| v.user_id).collect();
        assert_eq!(active, vec!["u-1"]);

        directory.reset("webhook").await.unwrap();
        assert_eq!(directory.len().await, 2);

        directory.reset("user").await.unwrap();
        assert!(directory.is_empty().await);
    }
}
