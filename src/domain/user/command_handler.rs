use async_trait::async_trait;
use std::sync::Arc;

use crate::cqrs::{Command, CommandHandler};
use crate::event_sourcing::core::{Aggregate, EsResult, EventEnvelope};
use crate::event_sourcing::store::AggregateRepository;
use crate::projection::ProjectorManager;
use crate::utils::{retry_on_conflict, RetryConfig};

use super::aggregate::UserAggregate;
use super::commands::*;
use super::errors::UserError;

// ============================================================================
// User Command Handler
// ============================================================================
//
// Orchestrates: Command → load Aggregate → domain method → Save
//
// On a concurrency conflict the whole cycle is re-run against fresh state,
// bounded by the retry config. Committed events are then handed to the
// projector manager; a projection failure is logged and never fails the
// command, since the events are already durable.
//
// ============================================================================

#[derive(Clone)]
pub struct UserCommandHandler {
    repository: AggregateRepository,
    projectors: Option<Arc<ProjectorManager>>,
    retry: RetryConfig,
}

impl UserCommandHandler {
    pub fn new(repository: AggregateRepository) -> Self {
        Self {
            repository,
            projectors: None,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_projectors(mut self, projectors: Arc<ProjectorManager>) -> Self {
        self.projectors = Some(projectors);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Load → mutate → save, re-run from scratch on conflict.
    async fn update<F>(&self, user_id: &str, mutate: F) -> EsResult<()>
    where
        F: Fn(&mut UserAggregate) -> EsResult<()> + Send + Sync,
    {
        let repository = &self.repository;
        let mutate = &mutate;

        let committed = retry_on_conflict(self.retry.clone(), move |_attempt| async move {
            let mut user = repository.load::<UserAggregate>(user_id).await?;
            mutate(&mut user)?;
            repository.save(&mut user).await
        })
        .await?;

        self.publish(&committed).await;
        Ok(())
    }

    async fn publish(&self, committed: &[EventEnvelope]) {
        let Some(projectors) = &self.projectors else {
            return;
        };
        if let Err(err) = projectors.project_events(committed).await {
            tracing::warn!(error = %err, "Read models lag behind the event log until rebuilt");
        }
    }
}

#[async_trait]
impl CommandHandler<CreateUser> for UserCommandHandler {
    async fn handle(&self, command: CreateUser) -> EsResult<()> {
        let user_id = command.aggregate_id();
        if self.repository.exists(UserAggregate::AGGREGATE_TYPE, user_id).await? {
            return Err(UserError::AlreadyExists(user_id.to_string()).into());
        }

        let mut user = UserAggregate::new(user_id);
        user.create(command.email.clone(), command.display_name.trim())?;

        // A conflict here means someone else created the same id first
        let committed = self.repository.save(&mut user).await.map_err(|err| {
            if err.is_conflict() {
                UserError::AlreadyExists(user_id.to_string()).into()
            } else {
                err
            }
        })?;

        self.publish(&committed).await;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler<ChangeUserEmail> for UserCommandHandler {
    async fn handle(&self, command: ChangeUserEmail) -> EsResult<()> {
        self.update(&command.user_id, |user| user.change_email(command.new_email.clone()))
            .await
    }
}

#[async_trait]
impl CommandHandler<RenameUser> for UserCommandHandler {
    async fn handle(&self, command: RenameUser) -> EsResult<()> {
        self.update(&command.user_id, |user| user.rename(command.display_name.trim()))
            .await
    }
}

#[async_trait]
impl CommandHandler<DeactivateUser> for UserCommandHandler {
    async fn handle(&self, command: DeactivateUser) -> EsResult<()> {
        self.update(&command.user_id, |user| user.deactivate(command.reason.clone()))
            .await
    }
}

#[async_trait]
impl CommandHandler<ReactivateUser> for UserCommandHandler {
    async fn handle(&self, command: ReactivateUser) -> EsResult<()> {
        self.update(&command.user_id, |user| user.reactivate(command.notes.clone()))
            .await
    }
}
